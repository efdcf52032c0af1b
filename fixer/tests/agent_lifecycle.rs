//! Loop-level tests for whole agent runs against a scratch workspace.
//!
//! These drive `run_agent` with scripted oracles through the public API:
//! decide, gate, dispatch, edit validation and termination.

use fixer::agents::ActionEvaluator;
use fixer::core::trajectory::Trajectory;
use fixer::core::types::{Action, ActionKind, Edit, Edits, Search, Submit, ViewFile};
use fixer::dispatch::Toolbox;
use fixer::edit::EditPipeline;
use fixer::io::config::FixerConfig;
use fixer::looping::{LoopConfig, LoopOutcome, LoopStop, Task, run_agent};
use fixer::test_support::{
    MarkerChecker, PassthroughRewriter, RecordingVcs, ScriptedDecider, ScriptedEvaluator,
    TestWorkspace,
};

const MODULE: &str = "def total(items):\n    result = 0\n    for item in items:\n        result += item\n    return result - 1\n";

fn edit(path: &str, start: usize, end: usize, old: &str, new: &str) -> Edit {
    Edit {
        file_path: path.to_string(),
        short_description: "fix".to_string(),
        code_to_replace: old.to_string(),
        start_line: start,
        end_line: end,
        new_code: new.to_string(),
        seen_all_needed_code: true,
        no_other_file_viewing_needed: true,
        edit_contains_all_needed_code: true,
        no_unknowns: true,
    }
}

fn edits(batch: Vec<Edit>) -> Action {
    Action::new("apply the fix", ActionKind::Edits(Edits { edits: batch }))
}

fn submit() -> Action {
    Action::new("done", ActionKind::Submit(Submit { done: true }))
}

fn run(
    ws: &TestWorkspace,
    actions: Vec<Action>,
    evaluator: Option<&dyn ActionEvaluator>,
    max_steps: u32,
) -> (LoopOutcome, Trajectory) {
    let workspace = ws.workspace();
    let config = FixerConfig::default();
    let (rewriter, checker, vcs) = (
        PassthroughRewriter,
        MarkerChecker::default(),
        RecordingVcs::default(),
    );
    let toolbox = Toolbox {
        workspace: &workspace,
        edits: EditPipeline {
            workspace: &workspace,
            rewriter: &rewriter,
            checker: &checker,
            vcs: &vcs,
            config: &config.edit,
        },
        search: &config.search,
        view: &config.view,
    };
    let decider = ScriptedDecider::new(actions);
    let mut trajectory = Trajectory::new();
    let mut steps_seen = 0;
    let outcome = run_agent(
        Task {
            problem: "total() is off by one",
            hints: None,
        },
        &decider,
        evaluator,
        &toolbox,
        &LoopConfig {
            max_steps,
            state_dir: None,
        },
        &mut trajectory,
        |_| steps_seen += 1,
    )
    .expect("run");
    assert_eq!(steps_seen, trajectory.len(), "one callback per entry");
    (outcome, trajectory)
}

/// Search, view, edit, submit: the usual path to a fix.
#[test]
fn search_view_edit_submit_fixes_the_file() {
    let ws = TestWorkspace::with_files(&[("calc/sum.py", MODULE)]).expect("ws");
    let actions = vec![
        Action::new(
            "find it",
            ActionKind::Search(Search {
                regex: "def total".to_string(),
            }),
        )
        .with_learning("sum lives in calc/"),
        Action::new(
            "read it",
            ActionKind::ViewFile(ViewFile {
                file_path: "calc/sum.py".to_string(),
                cursor_line: 1,
                before: 100,
                after: 100,
            }),
        ),
        edits(vec![edit(
            "calc/sum.py",
            5,
            5,
            "    return result - 1\n",
            "    return result\n",
        )]),
        submit(),
    ];

    let (outcome, trajectory) = run(&ws, actions, None, 30);

    assert_eq!(outcome.stop, LoopStop::Submitted { step: 3 });
    assert_eq!(outcome.steps_executed, 4);
    let results: Vec<&str> = trajectory.steps().iter().map(|s| s.result.as_str()).collect();
    assert!(results[0].contains("- calc/sum.py line 1 : def total(items):"));
    assert!(results[1].contains("5|     return result - 1"));
    assert_eq!(results[2], "Edits applied successfully");
    assert_eq!(results[3], "Submitted the solution.");
    assert_eq!(trajectory.learnings(), &["sum lives in calc/".to_string()]);
    assert!(ws.read("calc/sum.py").expect("read").ends_with("    return result\n"));
}

/// A rejected edit is recorded with the evaluator's feedback and never touches disk.
#[test]
fn rejected_edit_does_not_mutate_workspace() {
    let ws = TestWorkspace::with_files(&[("calc/sum.py", MODULE)]).expect("ws");
    let before = ws.read_bytes("calc/sum.py").expect("read");
    let evaluator = ScriptedEvaluator::rejecting("this drops the loop", "fix the return instead");

    let (outcome, trajectory) = run(
        &ws,
        vec![edits(vec![edit(
            "calc/sum.py",
            3,
            4,
            "    for item in items:\n        result += item\n",
            "    pass\n",
        )])],
        Some(&evaluator),
        1,
    );

    assert_eq!(outcome.stop, LoopStop::Exhausted { max_steps: 1 });
    assert_eq!(trajectory.len(), 1);
    let result = &trajectory.steps()[0].result;
    assert!(result.contains("fix the return instead"), "{result}");
    assert_eq!(ws.read_bytes("calc/sum.py").expect("read"), before);
}

/// A lint failure mid-batch keeps earlier edits and reports the failing file.
#[test]
fn failing_edit_in_batch_keeps_earlier_edits() {
    let ws = TestWorkspace::with_files(&[("a.py", "a = 1\n"), ("b.py", "b = 1\n")]).expect("ws");

    let (_, trajectory) = run(
        &ws,
        vec![
            edits(vec![
                edit("a.py", 1, 1, "a = 1\n", "a = 2\n"),
                edit("b.py", 1, 1, "b = 1\n", "b = UNDEFINED\n"),
            ]),
            submit(),
        ],
        None,
        5,
    );

    let result = &trajectory.steps()[0].result;
    assert!(result.starts_with("Error applying edits to file b.py: Error linting file."), "{result}");
    assert_eq!(ws.read("a.py").expect("read"), "a = 2\n");
    assert_eq!(ws.read("b.py").expect("read"), "b = 1\n");
}

/// A wrong line count is an observation the agent can recover from.
#[test]
fn line_count_mismatch_is_recoverable() {
    let ws = TestWorkspace::with_files(&[("calc/sum.py", MODULE)]).expect("ws");

    let (outcome, trajectory) = run(
        &ws,
        vec![
            edits(vec![edit(
                "calc/sum.py",
                5,
                5,
                "    for item in items:\n        result += item\n    return result - 1\n",
                "    return result\n",
            )]),
            edits(vec![edit(
                "calc/sum.py",
                5,
                5,
                "    return result - 1\n",
                "    return result\n",
            )]),
            submit(),
        ],
        None,
        5,
    );

    assert!(outcome.submitted());
    assert!(trajectory.steps()[0].result.contains("does not match the number of lines"));
    assert_eq!(trajectory.steps()[1].result, "Edits applied successfully");
}

/// Viewing past the end of a file reports the real length instead of failing.
#[test]
fn out_of_range_view_is_an_observation() {
    let ws = TestWorkspace::with_files(&[("calc/sum.py", MODULE)]).expect("ws");
    let (_, trajectory) = run(
        &ws,
        vec![Action::new(
            "peek",
            ActionKind::ViewFile(ViewFile {
                file_path: "calc/sum.py".to_string(),
                cursor_line: 900,
                before: 100,
                after: 100,
            }),
        )],
        None,
        1,
    );
    assert_eq!(
        trajectory.steps()[0].result,
        "Incorrect line number: 900. The file has only 5 lines."
    );
}
