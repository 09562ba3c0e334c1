//! A catalog of BASIC09 procedures and the `RUN` dependencies between
//! them, used to bundle a converted program with the runtime procedures
//! it actually needs.
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use regex::Regex;
use std::collections::BTreeSet;

/// The runtime support procedures shipped with the converter.
pub const RUNTIME_PROCEDURES: &str = include_str!("../resources/ecb.b09");

// Procedure names admit every character the sanitizer in the crate root
// does, hyphens included.
static PROCEDURE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^procedure\s+([\w-]+)\s*$").unwrap());
static RUN_INVOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bRUN\s+([\w-]+)").unwrap());

#[derive(Debug, Default)]
pub struct ProcedureBank {
    procedures: IndexMap<String, Procedure>,
}

#[derive(Debug)]
struct Procedure {
    body: String,
    invokes: BTreeSet<String>,
}

impl ProcedureBank {
    pub fn add_runtime_procedures(&mut self) {
        self.add_from_str(RUNTIME_PROCEDURES);
    }

    /// Splits `text` into procedures on `procedure <name>` header lines
    /// and records which procedures each one runs. Text before the first
    /// header is ignored; trailing blank lines are trimmed from each body.
    pub fn add_from_str(&mut self, text: &str) {
        let mut current: Option<(String, Vec<String>, BTreeSet<String>)> = None;
        for line in text.lines() {
            if let Some(caps) = PROCEDURE_HEADER.captures(line) {
                if let Some((name, body, invokes)) = current.take() {
                    self.insert(name, body, invokes);
                }
                current = Some((caps[1].to_string(), vec![line.to_string()], BTreeSet::new()));
            } else if let Some((_, body, invokes)) = current.as_mut() {
                invokes.extend(run_targets(line));
                body.push(line.to_string());
            }
        }
        if let Some((name, body, invokes)) = current.take() {
            self.insert(name, body, invokes);
        }
    }

    fn insert(&mut self, name: String, mut body: Vec<String>, invokes: BTreeSet<String>) {
        while matches!(body.last(), Some(l) if l.trim().is_empty()) {
            body.pop();
        }
        self.procedures.insert(
            name,
            Procedure {
                body: body.join("\n"),
                invokes,
            },
        );
    }

    pub fn procedure_names(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(|k| k.as_str())
    }

    /// The named procedure preceded by every known procedure it
    /// transitively runs: dependencies in alphabetical order, the
    /// procedure itself last. Names with no known body are skipped.
    pub fn procedure_and_dependencies(&self, name: &str) -> String {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (proc_name, proc) in &self.procedures {
            graph.add_node(proc_name.as_str());
            for dep in &proc.invokes {
                if self.procedures.contains_key(dep) {
                    graph.add_edge(proc_name.as_str(), dep.as_str(), ());
                }
            }
        }
        let mut deps: BTreeSet<&str> = BTreeSet::new();
        if graph.contains_node(name) {
            let mut dfs = Dfs::new(&graph, name);
            while let Some(n) = dfs.next(&graph) {
                deps.insert(n);
            }
        }
        deps.remove(name);
        let mut bodies: Vec<&str> = deps
            .iter()
            .filter_map(|d| self.procedures.get(*d).map(|p| p.body.as_str()))
            .collect();
        if let Some(p) = self.procedures.get(name) {
            bodies.push(p.body.as_str());
        }
        bodies.join("\n")
    }
}

/// Procedure names this line invokes with `RUN`, skipping matches that
/// sit inside a string literal (those leave an odd number of quotes
/// between the match and the end of the line).
fn run_targets(line: &str) -> Vec<String> {
    let mut targets = Vec::new();
    for caps in RUN_INVOCATION.captures_iter(line) {
        let (whole, name) = match (caps.get(0), caps.get(1)) {
            (Some(w), Some(n)) => (w, n),
            _ => continue,
        };
        if line[whole.end()..].matches('"').count() % 2 == 0 {
            targets.push(name.as_str().to_string());
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_alphabetical_with_the_target_last() {
        let mut bank = ProcedureBank::default();
        bank.add_from_str(
            "procedure foo\nRUN bar\n\nprocedure bar\nRUN baz\n\nprocedure baz\nPRINT \"HI\"",
        );
        assert_eq!(
            bank.procedure_and_dependencies("foo"),
            "procedure bar\nRUN baz\nprocedure baz\nPRINT \"HI\"\nprocedure foo\nRUN bar"
        );
    }

    #[test]
    fn hyphenated_procedure_names_are_recognized() {
        let mut bank = ProcedureBank::default();
        bank.add_from_str(
            "procedure my-prog\nRUN helper-sub\n\nprocedure helper-sub\nPRINT \"HI\"",
        );
        assert_eq!(
            bank.procedure_and_dependencies("my-prog"),
            "procedure helper-sub\nPRINT \"HI\"\nprocedure my-prog\nRUN helper-sub"
        );
    }

    #[test]
    fn run_inside_a_string_literal_is_not_a_dependency() {
        let mut bank = ProcedureBank::default();
        bank.add_from_str("procedure foo\nPRINT \"RUN bar\"\n\nprocedure bar\nPRINT");
        assert_eq!(
            bank.procedure_and_dependencies("foo"),
            "procedure foo\nPRINT \"RUN bar\""
        );
    }

    #[test]
    fn unknown_names_are_skipped() {
        let mut bank = ProcedureBank::default();
        bank.add_from_str("procedure foo\nRUN missing");
        assert_eq!(
            bank.procedure_and_dependencies("foo"),
            "procedure foo\nRUN missing"
        );
        assert_eq!(bank.procedure_and_dependencies("nope"), "");
    }

    #[test]
    fn runtime_bank_contains_the_support_procedures() {
        let mut bank = ProcedureBank::default();
        bank.add_runtime_procedures();
        let names: Vec<&str> = bank.procedure_names().collect();
        for expected in [
            "_ecb_text_address",
            "ecb_at",
            "ecb_button",
            "ecb_cls",
            "ecb_hex",
            "ecb_inkey",
            "ecb_joystk",
            "ecb_point",
            "ecb_reset",
            "ecb_set",
            "ecb_sound",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn cls_depends_on_the_text_address_helper() {
        let mut bank = ProcedureBank::default();
        bank.add_runtime_procedures();
        let out = bank.procedure_and_dependencies("ecb_cls");
        assert!(out.starts_with("procedure _ecb_text_address\n"));
        assert!(out.contains("\nprocedure ecb_cls\n"));
    }
}
