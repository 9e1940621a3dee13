//! Prompt templates.

/// Starter extraction script shown to the model for script generation.
pub const SCRIPT_SCAFFOLD: &str = include_str!("scaffold.py");

pub const CODE_START_MARKER: &str = "###START_CODE###";
pub const CODE_END_MARKER: &str = "###END_CODE###";

/// Question-answering prompt over retrieved context.
pub fn answer_prompt(question: &str, context: &str, json_format: bool) -> String {
    let prefix = if json_format { "JSON only response: " } else { "" };
    format!(
        "{prefix}Answer the question based on the provided context.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\
         Answer:"
    )
}

/// Prompt asking for an updated extraction script.
///
/// `sample` is text from the document the script will run on, used by the
/// model to infer the layout of the data.
pub fn script_prompt(instruction: &str, sample: &str, scaffold: &str) -> String {
    format!(
        "Your task is to update a scraping script to extract specified data from a PDF document.\n\
         Script to update:\n{scaffold}\n\n\
         Data to extract: {instruction}\n\n\
         Sample page to understand text structure:\n{sample}\n\n\
         The script must read the input PDF path from the first command-line argument \
         and the output path from the second.\n\
         Write CSV with a header row when the output path ends in .csv, and a JSON array \
         of objects when it ends in .json.\n\
         Use real newline characters instead of \\n escapes. Keep indentation correct.\n\
         Make sure the updated code runs as a standalone script.\n\
         Put the complete script between {CODE_START_MARKER} and {CODE_END_MARKER}."
    )
}
