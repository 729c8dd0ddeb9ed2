//! Oracle prompt templates.

use pagesift_config::SelectionMode;

/// Ask for the regions of `digest` worth extracting.
pub fn selection_prompt(task: &str, digest: &str, mode: SelectionMode) -> String {
    let reply_format = match mode {
        SelectionMode::Strict => {
            "Reply with a JSON array of objects, one per relevant element, each shaped \
             {\"tag\": string, \"id\": string|null, \"class\": string|null, \
             \"text\": string|null, \"href\": string|null}. \
             \"tag\" is required and must be a tag or role from the outline. \
             Use null for anything you are not sure of. Output the array only."
        }
        SelectionMode::Loose => {
            "Reply with a comma-separated list of tag names, ids, classes or short \
             text fragments. No extra information."
        }
    };
    format!(
        "You are locating information on a web page.\n\n\
         TASK: {task}\n\n\
         PAGE OUTLINE (one element per line, in document order):\n\
         {digest}\n\n\
         Which elements (headings, containers with an id or class, tables) are \
         most likely to hold what the task asks for?\n\
         {reply_format}"
    )
}

/// Ask for the final answer from candidate text plus the ground-truth list.
pub fn synthesis_prompt(task: &str, candidate: &str, elements_json: &str, omitted: usize) -> String {
    let candidate = if candidate.trim().is_empty() {
        "(no candidate text was found)"
    } else {
        candidate
    };
    let omitted_note = if omitted > 0 {
        format!("\n({omitted} further elements omitted)")
    } else {
        String::new()
    };
    format!(
        "TASK: {task}\n\n\
         CANDIDATE TEXT:\n{candidate}\n\n\
         PAGE ELEMENTS (JSON list of {{id, href, text}}):\n{elements_json}{omitted_note}\n\n\
         Answer the task using only the text above. Reply with a single JSON \
         object {{\"input\": <the task>, \"output\": <the answer>}} and nothing else."
    )
}

/// One-shot prompt over the cleaned page text.
pub fn single_pass_prompt(task: &str, page_text: &str) -> String {
    format!(
        "You are a web extraction assistant.\n\n\
         TASK: {task}\n\n\
         WEBSITE CONTENT:\n{page_text}\n\n\
         Use only the website content. Reply with a single JSON object \
         {{\"input\": <the task>, \"output\": <the answer>}} and nothing else."
    )
}

/// One query of the agentic loop over a window of the normalized snapshot.
pub fn agentic_prompt(task: &str, snapshot: &str, attempt: usize, truncated: bool) -> String {
    let coverage = if truncated {
        "This is the beginning of the page; more is available on request."
    } else {
        "This is the whole page."
    };
    format!(
        "You are reading a web page's accessibility tree to answer a task \
         (attempt {attempt}).\n\n\
         TASK: {task}\n\n\
         ACCESSIBILITY TREE ({coverage}):\n{snapshot}\n\n\
         Reply with a single JSON object {{\"state\": S, \"result\": R}} where S is\n\
         - \"DONE\" when the answer is present; R is {{\"input\": <the task>, \"output\": <the answer>}}\n\
         - \"SEARCH\" when more of the page is needed; R is null\n\
         - \"NOTFOUND\" when the page does not contain the answer; R is null"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_prompt_carries_task_and_outline() {
        let prompt = selection_prompt("Find the score", "h2 → Scores", SelectionMode::Strict);
        assert!(prompt.contains("Find the score"));
        assert!(prompt.contains("h2 → Scores"));
        assert!(prompt.contains("JSON array"));

        let loose = selection_prompt("x", "y", SelectionMode::Loose);
        assert!(loose.contains("comma-separated"));
    }

    #[test]
    fn synthesis_prompt_marks_empty_candidates_and_omissions() {
        let prompt = synthesis_prompt("t", "  ", "[]", 3);
        assert!(prompt.contains("(no candidate text was found)"));
        assert!(prompt.contains("(3 further elements omitted)"));
        assert!(!synthesis_prompt("t", "c", "[]", 0).contains("omitted"));
    }

    #[test]
    fn agentic_prompt_states_coverage() {
        assert!(agentic_prompt("t", "s", 1, true).contains("more is available"));
        assert!(agentic_prompt("t", "s", 2, false).contains("whole page"));
    }
}
