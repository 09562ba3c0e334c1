//! Rewrites a parsed program into a renderable one and emits BASIC09 text.
//!
//! Three passes run before rendering: builtin lifting ([hoist]), the
//! joystick work-variable declaration, and the optional variable
//! initializer and line-number liveness passes ([analysis]).
mod analysis;
mod hoist;

use crate::parser::ast::{Line, Program, Statement, Statements};
use log::debug;

pub struct CodegenOptions {
    /// Drop the number from lines nothing jumps to.
    pub filter_unused_line_numbers: bool,
    /// Zero every variable ahead of the program, the way the 6809
    /// interpreter did on RUN.
    pub initialize_vars: bool,
}

/// Work variables the joystick runtime procedures store through.
/// Spelling matches what those procedures declare, second `joy0y`
/// included.
const JOYSTICK_DECLARATION: &str = "dim joy0x, joy0y, joy1x, joy0y: integer";

pub fn generate(mut program: Program, options: &CodegenOptions) -> String {
    hoist::patch_program(&mut program);
    if analysis::uses_joystick(&program) {
        debug!("program reads the joystick, declaring work variables");
        program.prefix_lines.push(code_line(JOYSTICK_DECLARATION));
    }
    if options.initialize_vars {
        if let Some(line) = analysis::initializer_line(&program) {
            debug!(
                "initializing {} variables",
                line.statements.statements.len()
            );
            program.prefix_lines.push(line);
        }
    }
    if options.filter_unused_line_numbers {
        analysis::filter_line_numbers(&mut program);
    }
    program.basic09_text()
}

fn code_line(text: &str) -> Line {
    Line {
        num: None,
        statements: Statements {
            statements: vec![Statement::Code(text.to_string())],
            multi_line: true,
        },
        is_referenced: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn generate_with(source: &str, options: &CodegenOptions) -> String {
        generate(parse(source).unwrap(), options)
    }

    fn check(source: &str, expected: &str) {
        let options = CodegenOptions {
            filter_unused_line_numbers: false,
            initialize_vars: false,
        };
        assert_eq!(generate_with(source, &options), expected);
    }

    #[test]
    fn assignments_and_number_literals() {
        check("10 A=123", "10 A = 123.0");
        check("10 B=123.4", "10 B = 123.4");
        check("10 A=1E3", "10 A = 1000.0");
        check("10 A = 1 2 3", "10 A = 123.0");
        check("10 A=-.5", "10 A = -0.5");
    }

    #[test]
    fn hex_literals() {
        check("10 A=&H1F", "10 A = $1F");
        check("10 A=&HFFFFFF", "10 A = 16777215");
    }

    #[test]
    fn logical_operators_become_intrinsics() {
        check("10 Z=A AND B", "10 Z = LAND(A, B)");
        check("10 Z=A=B OR F=Z", "10 Z = LOR(A = B, F = Z)");
        check("10 Z=NOT A", "10 Z = LNOT(A)");
    }

    #[test]
    fn string_expressions() {
        check("10 C$=A$+B$", "10 C$ = A$ + B$");
        check("10 X$=MID$(A$,2,3)", "10 X$ = MID$(A$, 2.0, 3.0)");
        check("10 X=LEN(A$)", "10 X = LEN(A$)");
        check("10 X=VAL(A$)", "10 X = VAL(A$)");
        check("10 X$=CHR$(65)", "10 X$ = CHR$(65.0)");
    }

    #[test]
    fn inline_if_forms() {
        check("10 IF A=1 THEN 20", "10 IF A = 1.0 THEN 20");
        check("10 IF A=1 THEN 20 ELSE 30", "10 IF A = 1.0 THEN 20 ELSE 30");
        check("10 IF A$<>\"\" THEN 20", "10 IF A$ <> \"\" THEN 20");
        check("10 IF NOT (A<1) THEN 100", "10 IF NOT(A < 1.0) THEN 100");
    }

    #[test]
    fn block_if_forms() {
        check(
            "2 IFA<10THENB=A*2",
            "2 IF A < 10.0 THEN\n  B = A * 2.0\nENDIF",
        );
        check(
            "10 IF A=1 THEN B=1 ELSE B=2",
            "10 IF A = 1.0 THEN\n  B = 1.0\nELSE\n  B = 2.0\nENDIF",
        );
    }

    #[test]
    fn statements_split_across_output_lines() {
        check("10 A=1:B=2", "10 A = 1.0\nB = 2.0");
    }

    #[test]
    fn print_statements() {
        check("10 PRINTA$,B$", "10 PRINT A$, B$");
        check("10 PRINT A$,,B$", "10 PRINT A$, \"\", B$");
        // adjacent expressions gain the implicit semicolon
        check("10 PRINT\"TIME\"T/10;", "10 PRINT \"TIME\"; T / 10.0;");
        check("10 ?A", "10 PRINT A");
        check("10 PRINT", "10 PRINT");
    }

    #[test]
    fn print_at_desugars_to_a_run_call() {
        check(
            "10 PRINT@32,\"HELLO WORLD\"",
            "10 RUN ecb_at(32.0) \\ PRINT \"HELLO WORLD\"",
        );
    }

    #[test]
    fn sound_gains_the_fixed_volume_argument() {
        check("10 SOUND 100,10", "10 RUN ecb_sound(100.0, 10.0, 31.0)");
    }

    #[test]
    fn cls_defaults_to_green() {
        check("10 CLS", "10 RUN ecb_cls(1)");
        check("10 CLS 3", "10 RUN ecb_cls(3.0)");
        check("10 CLS B", "10 RUN ecb_cls(B)");
    }

    #[test]
    fn set_reset_and_poke() {
        check("10 RESET(3,4)", "10 RUN ecb_reset(3.0, 4.0)");
        check("10 SET(3,4,5)", "10 RUN ecb_set(3.0, 4.0, 5.0)");
        check("10 POKE 65497,A+B", "10 POKE 65497.0, A + B");
    }

    #[test]
    fn clear_survives_as_a_comment() {
        check("10 CLEAR", "10 (* CLEAR *)");
        check("10 CLEAR 200", "10 (* CLEAR 200 *)");
    }

    #[test]
    fn comments() {
        check("100 REM HELLO", "100 (* HELLO *)");
        check("100 REM", "100 (* *)");
        check("100 'HI", "100 (*HI *)");
    }

    #[test]
    fn data_elements_are_numbers_or_quoted_strings() {
        check("10 DATA 1,2.5,\"A\"", "10 DATA 1.0, 2.5, \"A\"");
        check("10 DATA BAZ  ,QUX", "10 DATA \"BAZ  \", \"QUX\"");
        check("20 DATA   , ", "20 DATA \"\", \"\"");
    }

    #[test]
    fn bare_data_elements_may_contain_colons() {
        check("10 DATA FOO:BAR", "10 DATA \"FOO:BAR\"");
        // a numeric element still yields the colon to the next statement
        check("10 DATA 1:PRINT A", "10 DATA 1.0\nPRINT A");
    }

    #[test]
    fn jumps() {
        check("10 GOTO 10", "10 GOTO 10");
        check("10 GOSUB 100", "10 GOSUB 100");
        check("10 ON X GOTO 20,30", "10 ON X GOTO 20, 30");
        check("10 ON X GOSUB 20,30", "10 ON X GOSUB 20, 30");
    }

    #[test]
    fn for_next_nesting_indents_the_body() {
        check(
            "10 FOR YY=1 TO 20 STEP 1\n20 FOR XX=1 TO 20 STEP 1\n\
             30 PRINT XX, YY\n40 NEXT XX, YY\n50 PRINT \"HELLO\"",
            "10 FOR YY = 1.0 TO 20.0 STEP 1.0\n20   FOR XX = 1.0 TO 20.0 STEP 1.0\n\
             30     PRINT XX, YY\n40 NEXT XX \\ NEXT YY\n50 PRINT \"HELLO\"",
        );
    }

    #[test]
    fn dim_declares_initializes_and_renames() {
        check(
            "11 DIMA(12)",
            "11 DIM arr_A(13) \\ FOR tmp_1 = 1 TO 13 \\ arr_A(tmp_1) = 0 \\ NEXT tmp_1",
        );
        check(
            "11 DIMA(12,&H123)",
            "11 DIM arr_A(13, $124) \\ FOR tmp_1 = 1 TO 13 \\ FOR tmp_2 = 1 TO $124 \\ \
             arr_A(tmp_1, tmp_2) = 0 \\ NEXT tmp_2 \\ NEXT tmp_1",
        );
        check(
            "11 DIMA$(3)",
            "11 DIM arr_A$(4) \\ FOR tmp_1 = 1 TO 4 \\ arr_A$(tmp_1) = \"\" \\ NEXT tmp_1",
        );
    }

    #[test]
    fn array_references_get_the_arr_prefix() {
        check("10 A(1)=2", "10 arr_A(1.0) = 2.0");
        check("10 PRINT A(1)", "10 PRINT arr_A(1.0)");
    }

    #[test]
    fn builtins_lift_into_run_statements() {
        check("11 X=BUTTON(1)", "11 RUN ecb_button(1.0, X)");
        check("11 X=POINT(1,2)", "11 RUN ecb_point(1.0, 2.0, X)");
        check("11 X$=INKEY$", "11 RUN ecb_inkey(X$)");
        check("11 X$=HEX$(1)", "11 RUN ecb_hex(1.0, X$)");
        check(
            "11 PRINT HEX$(1)",
            "11 RUN ecb_hex(1.0, tmp1$) \\ PRINT tmp1$",
        );
    }

    #[test]
    fn joystick_use_declares_work_variables() {
        check(
            "11 PRINT JOYSTK(1)",
            "dim joy0x, joy0y, joy1x, joy0y: integer\n\
             11 RUN ecb_joystk(1.0, tmp1) \\ PRINT tmp1",
        );
    }

    #[test]
    fn nested_builtins_lift_innermost_first() {
        check(
            "11 PRINT JOYSTK(JOYSTK(0))",
            "dim joy0x, joy0y, joy1x, joy0y: integer\n\
             11 RUN ecb_joystk(0.0, tmp1) \\ RUN ecb_joystk(tmp1, tmp2) \\ PRINT tmp2",
        );
    }

    #[test]
    fn variable_initialization() {
        let options = CodegenOptions {
            filter_unused_line_numbers: false,
            initialize_vars: true,
        };
        assert_eq!(
            generate_with("10 A=B+C", &options),
            "A = 0.0\nB = 0.0\nC = 0.0\n10 A = B + C"
        );
        assert_eq!(
            generate_with("10 A$=B$", &options),
            "A$ = \"\"\nB$ = \"\"\n10 A$ = B$"
        );
        // the array name itself gets a scalar initializer
        assert_eq!(
            generate_with("10 A(1)=2", &options),
            "arr_A = 0.0\n10 arr_A(1.0) = 2.0"
        );
    }

    #[test]
    fn unreferenced_line_numbers_are_dropped() {
        let options = CodegenOptions {
            filter_unused_line_numbers: true,
            initialize_vars: false,
        };
        assert_eq!(
            generate_with("10 PRINT A\n20 GOTO 40\n30 PRINT B\n40 PRINT C", &options),
            "PRINT A\nGOTO 40\nPRINT B\n40 PRINT C"
        );
        assert_eq!(
            generate_with("10 IF A=1 THEN 30\n20 PRINT A\n30 PRINT B", &options),
            "IF A = 1.0 THEN 30\nPRINT A\n30 PRINT B"
        );
        assert_eq!(
            generate_with("10 ON X GOTO 20,30\n20 PRINT A\n30 PRINT B", &options),
            "ON X GOTO 20, 30\n20 PRINT A\n30 PRINT B"
        );
    }

    #[test]
    fn duplicate_line_numbers_all_keep_their_label() {
        let options = CodegenOptions {
            filter_unused_line_numbers: true,
            initialize_vars: false,
        };
        assert_eq!(
            generate_with("10 GOTO 20\n20 PRINT A\n20 PRINT B", &options),
            "GOTO 20\n20 PRINT A\n20 PRINT B"
        );
    }

    #[test]
    fn empty_source_renders_empty() {
        check("", "");
    }
}
