//! Oracle roles backed by an [`Executor`].
//!
//! Every call gets its own directory `<state_dir>/calls/<seq>-<role>/` holding
//! the rendered prompt, the output schema, the raw output and the executor log.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::trajectory::Trajectory;
use crate::core::types::{Action, DiffEvaluation, Evaluation, MetaEvaluation};
use crate::io::config::OracleConfig;
use crate::io::executor::{ExecRequest, Executor, execute_and_load_json};
use crate::io::prompt::PromptEngine;

use super::{
    ACTION_SCHEMA, ActionEvaluator, Decider, EVALUATION_SCHEMA, FixGrader, GRADE_SCHEMA,
    META_EVALUATION_SCHEMA, MetaEvaluator, REWRITE_SCHEMA, Rewriter, write_output_schema,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Decide,
    Evaluate,
    Rewrite,
    Grade,
    MetaEvaluate,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Decide => "decide",
            Role::Evaluate => "evaluate",
            Role::Rewrite => "rewrite",
            Role::Grade => "grade",
            Role::MetaEvaluate => "meta_evaluate",
        }
    }

    fn schema(self) -> &'static str {
        match self {
            Role::Decide => ACTION_SCHEMA,
            Role::Evaluate => EVALUATION_SCHEMA,
            Role::Rewrite => REWRITE_SCHEMA,
            Role::Grade => GRADE_SCHEMA,
            Role::MetaEvaluate => META_EVALUATION_SCHEMA,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RewriteOutput {
    code: String,
}

/// All oracle roles over one executor backend.
pub struct ExecOracle<E> {
    executor: E,
    prompts: PromptEngine,
    calls_dir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
    seq: AtomicU32,
}

impl<E: Executor> ExecOracle<E> {
    pub fn new(executor: E, config: &OracleConfig, state_dir: &Path) -> Result<Self> {
        Ok(Self {
            executor,
            prompts: PromptEngine::new(config.observation_limit_bytes)?,
            calls_dir: state_dir.join("calls"),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
            seq: AtomicU32::new(0),
        })
    }

    /// Number of calls issued so far.
    pub fn calls(&self) -> u32 {
        self.seq.load(Ordering::Relaxed)
    }

    #[instrument(skip_all, fields(role = role.as_str()))]
    fn call<T: DeserializeOwned>(&self, role: Role, prompt: String) -> Result<T> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let dir = self.calls_dir.join(format!("{seq:04}-{}", role.as_str()));
        fs::create_dir_all(&dir).with_context(|| format!("create call dir {}", dir.display()))?;

        let schema_path = dir.join("schema.json");
        write_output_schema(&schema_path, role.schema())?;
        let schema: Value = serde_json::from_str(role.schema())
            .with_context(|| format!("parse {} schema", role.as_str()))?;

        let prompt_path = dir.join("prompt.md");
        fs::write(&prompt_path, &prompt)
            .with_context(|| format!("write prompt {}", prompt_path.display()))?;

        let request = ExecRequest {
            workdir: dir.clone(),
            prompt,
            output_schema_path: schema_path,
            output_path: dir.join("output.json"),
            executor_log_path: dir.join("executor.log"),
            timeout: self.timeout,
            output_limit_bytes: self.output_limit_bytes,
            stream_path: Some(dir.join("stream.jsonl")),
        };
        debug!(seq, "oracle call");
        execute_and_load_json(&self.executor, &request, &schema)
            .with_context(|| format!("{} oracle call {seq}", role.as_str()))
    }
}

impl<E: Executor> Decider for ExecOracle<E> {
    fn decide(&self, trajectory: &Trajectory, problem: &str, hints: Option<&str>) -> Result<Action> {
        let prompt = self.prompts.render_decide(trajectory, problem, hints)?;
        self.call(Role::Decide, prompt)
    }
}

impl<E: Executor> ActionEvaluator for ExecOracle<E> {
    fn evaluate(
        &self,
        trajectory: &Trajectory,
        pending: &Action,
        possible_actions: &str,
        problem: &str,
    ) -> Result<Evaluation> {
        let prompt = self
            .prompts
            .render_evaluate(trajectory, pending, possible_actions, problem)?;
        self.call(Role::Evaluate, prompt)
    }
}

impl<E: Executor> Rewriter for ExecOracle<E> {
    fn rewrite(&self, window: &str, to_replace: &str, new_code: &str) -> Result<String> {
        let prompt = self.prompts.render_rewrite(window, to_replace, new_code)?;
        let output: RewriteOutput = self.call(Role::Rewrite, prompt)?;
        Ok(output.code)
    }
}

impl<E: Executor> FixGrader for ExecOracle<E> {
    fn grade(
        &self,
        problem: &str,
        diff: &str,
        reference_diff: &str,
        test_patch: &str,
    ) -> Result<DiffEvaluation> {
        let prompt = self
            .prompts
            .render_grade(problem, diff, reference_diff, test_patch)?;
        let graded: DiffEvaluation = self.call(Role::Grade, prompt)?;
        graded.validate()?;
        Ok(graded)
    }
}

impl<E: Executor> MetaEvaluator for ExecOracle<E> {
    fn meta_evaluate(
        &self,
        trajectory: &Trajectory,
        problem: &str,
        reference_diff: &str,
    ) -> Result<MetaEvaluation> {
        let prompt = self
            .prompts
            .render_meta_evaluate(trajectory, problem, reference_diff)?;
        self.call(Role::MetaEvaluate, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ActionKind;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Writes queued JSON outputs in order and remembers every request.
    struct CapturingExecutor {
        outputs: RefCell<VecDeque<Value>>,
        requests: RefCell<Vec<ExecRequest>>,
    }

    impl CapturingExecutor {
        fn new(outputs: Vec<Value>) -> Self {
            Self {
                outputs: RefCell::new(outputs.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Executor for CapturingExecutor {
        fn exec(&self, request: &ExecRequest) -> Result<()> {
            self.requests.borrow_mut().push(request.clone());
            if let Some(output) = self.outputs.borrow_mut().pop_front() {
                fs::write(&request.output_path, serde_json::to_string(&output)?)?;
            }
            Ok(())
        }
    }

    fn oracle(outputs: Vec<Value>, state_dir: &Path) -> ExecOracle<CapturingExecutor> {
        ExecOracle::new(
            CapturingExecutor::new(outputs),
            &OracleConfig::default(),
            state_dir,
        )
        .expect("oracle")
    }

    /// Verifies a decide call writes its artifacts and parses the action.
    #[test]
    fn decide_writes_call_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let oracle = oracle(
            vec![serde_json::json!({
                "thoughts": "look around",
                "learning": null,
                "action_name": "search",
                "action_input": {"regex": "class Foo"}
            })],
            temp.path(),
        );

        let action = oracle
            .decide(&Trajectory::new(), "Foo breaks", None)
            .expect("decide");
        assert!(matches!(action.kind, ActionKind::Search(_)));

        let call_dir = temp.path().join("calls/0000-decide");
        assert!(call_dir.join("prompt.md").is_file());
        assert!(call_dir.join("schema.json").is_file());
        assert!(call_dir.join("output.json").is_file());
        let requests = oracle.executor.requests.borrow();
        assert!(requests[0].prompt.contains("Foo breaks"));
        assert_eq!(requests[0].workdir, call_dir);
    }

    /// Verifies call directories are numbered by call order.
    #[test]
    fn calls_are_sequenced() {
        let temp = tempfile::tempdir().expect("tempdir");
        let oracle = oracle(
            vec![
                serde_json::json!({"code": "a = 2\n"}),
                serde_json::json!({"observations": "ok", "right_track": true, "feedback": null}),
            ],
            temp.path(),
        );
        let code = oracle.rewrite("a = 1\n", "a = 1", "a = 2").expect("rewrite");
        assert_eq!(code, "a = 2\n");
        let pending = Action::new(
            "",
            ActionKind::Submit(crate::core::types::Submit { done: true }),
        );
        let verdict = oracle
            .evaluate(&Trajectory::new(), &pending, ACTION_SCHEMA, "bug")
            .expect("evaluate");
        assert!(verdict.right_track);
        assert!(temp.path().join("calls/0000-rewrite").is_dir());
        assert!(temp.path().join("calls/0001-evaluate").is_dir());
        assert_eq!(oracle.calls(), 2);
    }

    /// Verifies output that breaks the action schema is a hard error.
    #[test]
    fn contract_violation_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let oracle = oracle(
            vec![serde_json::json!({
                "thoughts": "x",
                "learning": null,
                "action_name": "run_file",
                "action_input": {}
            })],
            temp.path(),
        );
        let err = oracle.decide(&Trajectory::new(), "bug", None).unwrap_err();
        assert!(format!("{err:#}").contains("decide oracle call 0"), "{err:#}");
    }

    /// Verifies grades outside 0..=10 are rejected.
    #[test]
    fn grade_out_of_range_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let oracle = oracle(
            vec![serde_json::json!({
                "observations": "x",
                "score": 42,
                "pass_tests": true,
                "correct": true
            })],
            temp.path(),
        );
        assert!(oracle.grade("p", "d", "r", "t").is_err());
    }
}
