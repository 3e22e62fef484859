//! Interactive mode selection.

use std::io::{self, BufRead, Write};

use console::style;

use crate::harvest::ContentFilter;

/// Ask for the harvest mode.
///
/// Enter or `0` keeps every review; `1` asks for a keyword, which must not
/// be blank. Anything else re-prompts. Returns `None` when input ends.
pub fn select_mode<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    target_count: usize,
) -> io::Result<Option<ContentFilter>> {
    writeln!(output, "\n{}", style("Harvest mode").bold())?;
    writeln!(
        output,
        "  0 - default: collect up to {} reviews",
        target_count
    )?;
    writeln!(
        output,
        "  1 - keyword filter: only reviews containing a given text"
    )?;

    loop {
        let Some(answer) = ask(input, output, "Select mode [0/1, Enter = 0]: ")? else {
            return Ok(None);
        };
        match answer.as_str() {
            "" | "0" => {
                writeln!(output, "{} Default mode", style("✓").green())?;
                return Ok(Some(ContentFilter::All));
            }
            "1" => return read_keyword(input, output),
            _ => writeln!(output, "{} Please enter 0 or 1", style("✗").red())?,
        }
    }
}

fn read_keyword<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<ContentFilter>> {
    loop {
        let Some(answer) = ask(input, output, "Keyword the review text must contain: ")? else {
            return Ok(None);
        };
        if answer.is_empty() {
            writeln!(output, "{} Keyword cannot be empty", style("✗").red())?;
            continue;
        }
        writeln!(
            output,
            "{} Filtering on '{}' (exact for CJK, case-insensitive otherwise)",
            style("✓").green(),
            answer
        )?;
        return Ok(Some(ContentFilter::keyword(answer)));
    }
}

/// Print `prompt` and read one trimmed line; `None` at end of input.
fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> io::Result<Option<String>> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
