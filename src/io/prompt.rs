//! Prompt rendering for the three oracle exchanges.
//!
//! Each exchange (operation selection, argument generation, final answer)
//! has its own markdown template with a fixed output contract the parsers
//! key on: `OPERATION:`, `ARGUMENTS:`, and `ANSWER:` respectively.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::chain::Chain;
use crate::core::table::Table;

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const ARGS_TEMPLATE: &str = include_str!("prompts/args.md");
const ANSWER_TEMPLATE: &str = include_str!("prompts/answer.md");

fn engine() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_template("plan", PLAN_TEMPLATE)
        .expect("plan template should be valid");
    env.add_template("args", ARGS_TEMPLATE)
        .expect("args template should be valid");
    env.add_template("answer", ANSWER_TEMPLATE)
        .expect("answer template should be valid");
    env
}

fn columns_line(table: &Table) -> String {
    let schema = table.schema();
    if schema.is_empty() {
        "None".to_string()
    } else {
        schema.join(", ")
    }
}

/// Render the operation-selection prompt over the eligible candidates.
///
/// `constrained` marks a retry after a conflict, adding a reminder that the
/// candidate list is the only valid choice.
pub fn render_plan(
    table: &Table,
    question: &str,
    chain: &Chain,
    max_steps: usize,
    candidates: &[&str],
    constrained: bool,
) -> Result<String> {
    let env = engine();
    let template = env.get_template("plan")?;
    let rendered = template
        .render(context! {
            table => table.render_pipe(),
            columns => columns_line(table),
            question => question,
            history => chain.render_history(),
            candidates => candidates.join(", "),
            max_steps => max_steps,
            constrained => constrained,
        })
        .context("render plan prompt")?;
    Ok(rendered)
}

/// Render the argument-generation prompt for one operation.
pub fn render_args(table: &Table, question: &str, operation: &str) -> Result<String> {
    let env = engine();
    let template = env.get_template("args")?;
    let rendered = template
        .render(context! {
            table => table.render_pipe(),
            columns => columns_line(table),
            question => question,
            operation => operation,
            rows => table.len(),
        })
        .context("render args prompt")?;
    Ok(rendered)
}

/// Render the final-answer prompt over the terminal table.
pub fn render_answer(table: &Table, question: &str) -> Result<String> {
    let env = engine();
    let template = env.get_template("answer")?;
    let rendered = template
        .render(context! {
            table => table.render_pipe(),
            question => question,
        })
        .context("render answer prompt")?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::cyclists;

    #[test]
    fn plan_prompt_carries_table_question_and_contract() {
        let prompt = render_plan(
            &cyclists(),
            "Which country had the most cyclists?",
            &Chain::start(),
            10,
            &["f_add_column", "f_group_by"],
            false,
        )
        .expect("render");

        assert!(prompt.contains("Rank | Cyclist"));
        assert!(prompt.contains("Which country had the most cyclists?"));
        assert!(prompt.contains("CANDIDATE OPERATIONS: f_add_column, f_group_by"));
        assert!(prompt.contains("only 10 operations"));
        assert!(prompt.trim_end().ends_with("OPERATION:"));
        assert!(!prompt.contains("excluded due to conflicts"));
    }

    #[test]
    fn constrained_plan_prompt_warns_about_exclusions() {
        let prompt = render_plan(
            &cyclists(),
            "Who?",
            &Chain::start(),
            10,
            &["f_sort_by"],
            true,
        )
        .expect("render");
        assert!(prompt.contains("excluded due to conflicts"));
    }

    #[test]
    fn args_prompt_names_operation_and_row_count() {
        let prompt = render_args(&cyclists(), "Who?", "f_add_column").expect("render");
        assert!(prompt.contains("f_add_column"));
        assert!(prompt.contains("has 3 rows"));
        assert!(prompt.trim_end().ends_with("ARGUMENTS:"));
    }

    #[test]
    fn answer_prompt_renders_empty_table_placeholder() {
        let prompt = render_answer(&Table::new(), "Anything?").expect("render");
        assert!(prompt.contains("Empty table"));
        assert!(prompt.trim_end().ends_with("ANSWER:"));
    }
}
