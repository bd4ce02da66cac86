//! Rendering of grading results: pass/fail banners and, on failure, the
//! annotated expected/found listings with the divergence highlighted.
//! Pure presentation over already-computed data; the only decisions made
//! here are message templates and highlight positions.

use crossterm::terminal;

use crate::compare::DivergenceKind;
use crate::judge::{Divergence, JunitOutcome, Verdict, JUNIT_CLASS_NAME};
use crate::spec::{ExerciseSpec, TestCase};
use crate::style::{ColorScheme, Paint};

pub mod msg {
    pub const ALL_TESTS_PASSED: &str = "Your exercise passes all the tests";
    pub const EXERCISE_WITHOUT_TESTS: &str = "This exercise has no automatic tests";
    pub const PASS_BANNER: &str = " PASS ";
    pub const FAIL_BANNER: &str = " FAIL ";

    pub const EXTRA_LINE: &str = "This output line was not expected:";
    pub const MISSING_LINE: &str = "The program's output is missing:";
    pub const DIFFERENT_LINES: &str = "The following lines differ";

    pub const NEVER_FINISHES: &str = "Your exercise takes too long to finish";
    pub const NEVER_FINISHES_TIP: &str = "Run it manually with the specified input";
    pub const BREAKS: &str = "Your exercise ends unexpectedly";
    pub const BREAKS_TIP: &str =
        "Run the exercise outside the grader with the indicated input\n\
         and review the highlighted lines in the error output";
    pub const COMPILATION_ERROR: &str = "Errors found compiling";
    pub const COMPILATION_JUNIT_ERROR: &str = "Errors found compiling the JUnit tests";

    pub const TITLE_PROGRAM_EXECUTION: &str = "Program execution";
    pub const TITLE_STANDARD_INPUT: &str = "Standard input";
    pub const TITLE_EXPECTED_OUTPUT: &str = "Expected output";
    pub const TITLE_FOUND_OUTPUT: &str = "Found output";
    pub const TITLE_FOUND_STDERR: &str = "Found error output";
    pub const TITLE_DISCREPANCY: &str = "Discrepancy";
    pub const TITLE_JUNIT_ERROR: &str = "JUnit error";
}

pub struct Presenter<'a> {
    colors: &'a ColorScheme,
}

impl<'a> Presenter<'a> {
    pub fn new(colors: &'a ColorScheme) -> Self {
        Self { colors }
    }

    pub fn test_passed(&self, id: &str) {
        println!("Test {}: {}", id, self.colors.pass_banner.apply(msg::PASS_BANNER));
    }

    pub fn test_failed(&self, id: &str) {
        println!("Test {}: {}", id, self.colors.fail_banner.apply(msg::FAIL_BANNER));
    }

    pub fn all_tests_passed(&self) {
        println!("{}", msg::ALL_TESTS_PASSED);
    }

    pub fn exercise_without_tests(&self) {
        println!("{}", msg::EXERCISE_WITHOUT_TESTS);
    }

    /// "ERROR: msg" on stderr, tip lines indented underneath.
    pub fn error(&self, message: &str, tip: Option<&str>) {
        let mark = "ERROR:";
        let tab = " ".repeat(mark.len() + 1);
        eprintln!();
        eprintln!("{} {}", self.colors.error.apply(mark), message);
        if let Some(tip) = tip {
            eprintln!();
            for line in tip.lines() {
                eprintln!("{}{}", tab, line);
            }
        }
        eprintln!();
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", self.colors.warning.apply("WARNING:"), message);
    }

    pub fn compile_error(&self, program: &str, stderr: &[String]) {
        self.error(
            &format!("{} {}", msg::COMPILATION_ERROR, program),
            Some(&stderr.join("\n")),
        );
    }

    /// Full failure detail for one I/O test case. `verdict` must not be
    /// a pass.
    pub fn show_io_failure(&self, spec: &ExerciseSpec, case: &TestCase, verdict: &Verdict) {
        self.test_failed(&case.id);
        self.separator();
        self.show_program_execution(spec, case);
        self.show_provided_stdin(case);

        match verdict {
            Verdict::Pass => {}
            Verdict::Mismatch(divergence) => self.show_discrepancy(divergence),
            Verdict::Timeout => self.error(msg::NEVER_FINISHES, Some(msg::NEVER_FINISHES_TIP)),
            Verdict::Crash { stderr } => {
                self.show_found_stderr(stderr);
                self.error(msg::BREAKS, Some(msg::BREAKS_TIP));
            }
        }
    }

    fn show_program_execution(&self, spec: &ExerciseSpec, case: &TestCase) {
        eprintln!("{}", compose_title(msg::TITLE_PROGRAM_EXECUTION));
        eprintln!("The program was executed as follows:\n");
        let command = match spec.main_class.as_deref() {
            Some(main) => format!("java {}", main),
            None => "java".to_owned(),
        };
        eprintln!(
            "$ {} {}",
            self.colors.command.apply(&command),
            self.colors.command_args.apply(&case.args().join(" ")),
        );
    }

    fn show_provided_stdin(&self, case: &TestCase) {
        let Some(stdin) = &case.stdin else {
            return;
        };
        eprintln!("{}", compose_title(msg::TITLE_STANDARD_INPUT));
        eprintln!("The program was given this standard input:\n");
        eprintln!(
            "{}",
            compose_enumerated_text(stdin, self.colors, Paint::none(), None, None)
        );
    }

    fn show_discrepancy(&self, d: &Divergence) {
        eprintln!("{}", compose_title(msg::TITLE_EXPECTED_OUTPUT));
        eprintln!("This output was expected from the program:\n");
        eprintln!(
            "{}",
            compose_enumerated_text(
                &d.expected,
                self.colors,
                self.colors.expected,
                Some(d.expected_index),
                None,
            )
        );

        eprintln!("{}", compose_title(msg::TITLE_FOUND_OUTPUT));
        eprintln!("The output generated by the program was:\n");
        eprintln!(
            "{}",
            compose_enumerated_text(
                &d.found,
                self.colors,
                self.colors.found,
                Some(d.found_index),
                None,
            )
        );

        eprintln!("{}", compose_title(msg::TITLE_DISCREPANCY));
        match d.kind() {
            DivergenceKind::ExtraLine => {
                eprintln!("{}", msg::EXTRA_LINE);
                eprintln!(
                    "{}",
                    compose_enumerated_line(
                        d.found_index,
                        &d.found[d.found_index],
                        0,
                        self.colors,
                        self.colors.found,
                        false,
                        false,
                    )
                );
            }
            DivergenceKind::MissingLine => {
                eprintln!("{}", msg::MISSING_LINE);
                eprintln!(
                    "{}",
                    compose_enumerated_line(
                        d.expected_index,
                        &d.expected[d.expected_index],
                        0,
                        self.colors,
                        self.colors.expected,
                        false,
                        false,
                    )
                );
            }
            DivergenceKind::DifferentLine => {
                eprintln!("{}", msg::DIFFERENT_LINES);
                eprintln!(
                    "{}",
                    compose_enumerated_line(
                        d.expected_index,
                        &d.expected[d.expected_index],
                        0,
                        self.colors,
                        self.colors.expected,
                        false,
                        true,
                    )
                );
                eprintln!(
                    "{}",
                    compose_enumerated_line(
                        d.found_index,
                        &d.found[d.found_index],
                        0,
                        self.colors,
                        self.colors.found,
                        false,
                        true,
                    )
                );
            }
        }
    }

    fn show_found_stderr(&self, stderr: &[String]) {
        eprintln!("{}", compose_title(msg::TITLE_FOUND_STDERR));
        eprintln!("The error output generated by the program was:");
        // Frames inside the JRE are noise; highlight the student's own.
        eprintln!(
            "{}",
            compose_enumerated_text(
                stderr,
                self.colors,
                Paint::none(),
                None,
                Some(&|line: &str| !line.contains("at java.")),
            )
        );
    }

    pub fn show_junit_outcome(&self, outcome: &JunitOutcome) {
        match outcome {
            JunitOutcome::Passed => self.test_passed("JUnit"),
            JunitOutcome::CompileError { stderr } => {
                self.error(msg::COMPILATION_JUNIT_ERROR, Some(&stderr.join("\n")));
            }
            JunitOutcome::Failed { output } => {
                self.test_failed("JUnit");
                eprintln!("{}", compose_title(msg::TITLE_JUNIT_ERROR));
                eprintln!("JUnit generated this error output:");
                eprintln!("\t{}", output.join("\n\t"));
                eprintln!("Consider this error first:");
                for line in digest_junit_failure(output) {
                    eprintln!("* {}", line);
                }
            }
        }
    }

    fn separator(&self) {
        let (cols, _) = terminal::size().unwrap_or((40, 40));
        eprintln!("{}", "─".repeat(cols as usize));
    }
}

pub fn compose_title(title: &str) -> String {
    format!("\n{}\n{}\n", title, "=".repeat(title.len()))
}

fn compose_enumerated_text(
    lines: &[String],
    colors: &ColorScheme,
    paint: Paint,
    highlight_line: Option<usize>,
    highlight_fn: Option<&dyn Fn(&str) -> bool>,
) -> String {
    let width = (lines.len() + 1).to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(n, line)| {
            let highlighted = highlight_line == Some(n)
                || highlight_fn.map_or(false, |f| f(line));
            compose_enumerated_line(n, line, width, colors, paint, highlighted, false)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One listing line: right-aligned 1-based line number, a '!' mark when
/// highlighted, '|' delimiters around the text when part of a
/// side-by-side differing pair.
fn compose_enumerated_line(
    linenr: usize,
    line: &str,
    width: usize,
    colors: &ColorScheme,
    paint: Paint,
    highlighted: bool,
    delimited: bool,
) -> String {
    let mark = if highlighted {
        format!("{}  ", colors.diff_mark.apply("!"))
    } else {
        "   ".to_owned()
    };
    let delimiter = if delimited {
        colors.diff_mark.apply("|")
    } else {
        String::new()
    };
    let num = colors
        .line_number
        .apply(&format!("{:>width$}", linenr + 1, width = width.max(1)));
    format!("{}{}{}{}{}", num, mark, delimiter, paint.apply(line), delimiter)
}

/// Filters a JUnit console-launcher failure listing down to the first
/// failed test: its method name, display description and assertion
/// message.
pub fn digest_junit_failure(output: &[String]) -> [String; 3] {
    let mut test_name = String::new();
    let mut test_descr = String::new();
    let mut fail_descr = String::new();
    let mut found_first = false;

    let first_marker = format!("JUnit Jupiter:{}", JUNIT_CLASS_NAME);
    for line in output {
        if !found_first {
            if line.contains(&first_marker) {
                found_first = true;
                let split: Vec<_> = line.split(':').collect();
                test_descr = split.get(2).unwrap_or(&line.as_str()).to_string();
            }
            continue;
        }
        if line.contains("MethodSource") {
            let split: Vec<_> = line.split('\'').collect();
            test_name = split.get(3).unwrap_or(&line.as_str()).to_string();
            continue;
        }
        if line.contains("==>") {
            fail_descr = match line.split_once(": ") {
                Some((_, rest)) => rest.split("==>").next().unwrap_or(rest).to_string(),
                None => line.clone(),
            };
            break;
        }
    }

    [
        format!("Test name  : {}", test_name),
        format!("Description: {}", test_descr),
        format!("Problem    : {}", fail_descr),
    ]
}

#[cfg(test)]
mod test {
    use super::*;

    fn plain_colors() -> ColorScheme {
        colored::control::set_override(false);
        ColorScheme::clear()
    }

    #[test]
    fn enumerated_line_is_one_based_and_marked() {
        let colors = plain_colors();
        assert_eq!(
            compose_enumerated_line(0, "hola", 2, &colors, Paint::none(), false, false),
            " 1   hola"
        );
        assert_eq!(
            compose_enumerated_line(2, "hola", 1, &colors, Paint::none(), true, false),
            "3!  hola"
        );
        assert_eq!(
            compose_enumerated_line(0, "x", 1, &colors, Paint::none(), false, true),
            "1   |x|"
        );
    }

    #[test]
    fn enumerated_text_highlights_the_divergence_line() {
        let colors = plain_colors();
        let lines = vec!["a".to_owned(), "b".to_owned()];
        let text = compose_enumerated_text(&lines, &colors, Paint::none(), Some(1), None);
        assert_eq!(text, "1   a\n2!  b");
    }

    #[test]
    fn highlight_fn_marks_non_jre_frames() {
        let colors = plain_colors();
        let lines = vec![
            "Exception in thread \"main\" java.lang.ArithmeticException".to_owned(),
            "\tat java.base/java.util.Scanner.nextInt(Scanner.java)".to_owned(),
            "\tat Sum.main(Sum.java:7)".to_owned(),
        ];
        let text = compose_enumerated_text(
            &lines,
            &colors,
            Paint::none(),
            None,
            Some(&|line: &str| !line.contains("at java.")),
        );
        let rendered: Vec<_> = text.lines().collect();
        assert!(rendered[0].contains("1!"));
        assert!(!rendered[1].contains('!'));
        assert!(rendered[2].contains("3!"));
    }

    #[test]
    fn title_is_underlined() {
        assert_eq!(compose_title("Hi"), "\nHi\n==\n");
    }

    #[test]
    fn junit_digest_extracts_first_failure() {
        let output: Vec<String> = [
            "JUnit Jupiter:TestExercise:checks the sum of two numbers",
            "  MethodSource [className = 'TestExercise', methodName = 'testSum']",
            "  org.opentest4j.AssertionFailedError: expected 7 ==> expected: <7> but was: <8>",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let [name, descr, problem] = digest_junit_failure(&output);
        assert_eq!(name, "Test name  : testSum");
        assert_eq!(descr, "Description: checks the sum of two numbers");
        assert_eq!(problem, "Problem    : expected 7 ");
    }
}
