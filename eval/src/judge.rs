//! Grading of produced patches.
//!
//! The grader compares the agent's diff with the instance's reference fix and
//! test patch; the meta-evaluator reviews the whole trajectory.

use anyhow::{Context, Result};
use fixer::agents::{FixGrader, MetaEvaluator};
use fixer::core::trajectory::Trajectory;
use fixer::core::types::{DiffEvaluation, MetaEvaluation};
use tracing::{info, instrument};

use crate::instance::Instance;

#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub evaluation: DiffEvaluation,
    pub meta_evaluation: MetaEvaluation,
}

#[instrument(skip_all, fields(instance_id = %instance.instance_id))]
pub fn judge(
    grader: &dyn FixGrader,
    meta: &dyn MetaEvaluator,
    instance: &Instance,
    diff: &str,
    trajectory: &Trajectory,
) -> Result<Judgment> {
    let evaluation = grader
        .grade(
            &instance.problem_statement,
            diff,
            &instance.patch,
            &instance.test_patch,
        )
        .context("grade fix")?;
    info!(
        score = evaluation.score,
        pass_tests = evaluation.pass_tests,
        correct = evaluation.correct,
        "fix graded"
    );
    let meta_evaluation = meta
        .meta_evaluate(trajectory, &instance.problem_statement, &instance.patch)
        .context("meta-evaluate trajectory")?;
    Ok(Judgment {
        evaluation,
        meta_evaluation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixer::test_support::{FixedGrader, FixedMetaEvaluator};

    #[test]
    fn combines_grade_and_review() {
        let instance = Instance {
            repo: "a/b".to_string(),
            base_commit: "abc".to_string(),
            problem_statement: "bug".to_string(),
            hints_text: String::new(),
            instance_id: "a-1".to_string(),
            patch: "gold".to_string(),
            test_patch: "tests".to_string(),
        };
        let grade = DiffEvaluation {
            observations: "matches gold".to_string(),
            score: 9,
            pass_tests: true,
            correct: true,
        };
        let review = MetaEvaluation {
            observations: "found it fast".to_string(),
            feedback: "none".to_string(),
        };
        let judgment = judge(
            &FixedGrader(grade.clone()),
            &FixedMetaEvaluator(review.clone()),
            &instance,
            "diff",
            &Trajectory::new(),
        )
        .expect("judge");
        assert_eq!(judgment.evaluation, grade);
        assert_eq!(judgment.meta_evaluation, review);
    }
}
