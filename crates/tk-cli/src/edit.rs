//! Interactive editing through the text form.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use tk_codec::{decode_text, encode_text, Tiddler};

/// Open `original` in `$EDITOR` as a `.tid` file and read it back.
pub fn edit_in_editor(original: &Tiddler) -> anyhow::Result<Tiddler> {
    let mut file = tempfile::Builder::new()
        .prefix("tmp.")
        .suffix(".tid")
        .tempfile()?;
    file.write_all(&encode_text(original))?;
    file.flush()?;

    run_editor(file.path())?;
    let data = std::fs::read(file.path())
        .with_context(|| format!("reading back {}", file.path().display()))?;
    let edited = decode_text(&data).context("decoding edited tiddler")?;
    Ok(apply_edit(original, edited))
}

fn run_editor(path: &Path) -> anyhow::Result<()> {
    let status = Command::new("sh")
        .arg("-c")
        .arg("$EDITOR \"$1\"")
        .arg("sh")
        .arg(path)
        .status()
        .context("starting $EDITOR")?;
    if !status.success() {
        bail!("editor exited with {status}");
    }
    Ok(())
}

/// The edited tiddler, still addressed where `original` lives.
pub fn apply_edit(original: &Tiddler, mut edited: Tiddler) -> Tiddler {
    edited.title = original.title.clone();
    edited.bag = original.bag.clone();
    edited.recipe = original.recipe.clone();
    edited.node = original.node;
    edited
}

/// Changed lines between the text forms of two tiddlers.
pub fn changed_lines(before: &Tiddler, after: &Tiddler) -> Vec<(ChangeTag, String)> {
    let before = String::from_utf8_lossy(&encode_text(before)).into_owned();
    let after = String::from_utf8_lossy(&encode_text(after)).into_owned();
    TextDiff::from_lines(&before, &after)
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.value().trim_end_matches('\n').to_string()))
        .collect()
}

pub fn print_diff(before: &Tiddler, after: &Tiddler) {
    for (tag, line) in changed_lines(before, after) {
        match tag {
            ChangeTag::Delete => println!("{}", format!("-{line}").red()),
            ChangeTag::Insert => println!("{}", format!("+{line}").green()),
            ChangeTag::Equal => {}
        }
    }
}
