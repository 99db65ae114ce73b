// src/compile/document.rs

//! The compiled, immutable sequence of narrative and code blocks, plus its
//! two on-disk forms: a notebook (`analysis.ipynb`) and a standalone
//! program (`analysis.py`).

use serde_json::{json, Value};

/// Whether a block is prose or executable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Narrative,
    Code,
}

/// Where a block sits in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    Preamble,
    StepHeader { step_number: u32 },
    StepCode { step_number: u32 },
    Closing,
}

/// One block. Code blocks may carry a narrative `title` rendered before them
/// (used for the preamble and the closing summary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub role: BlockRole,
    pub kind: BlockKind,
    pub title: Option<String>,
    pub source: String,
}

impl Block {
    pub fn narrative(role: BlockRole, text: impl Into<String>) -> Self {
        Self {
            role,
            kind: BlockKind::Narrative,
            title: None,
            source: text.into(),
        }
    }

    pub fn code(role: BlockRole, source: impl Into<String>) -> Self {
        Self {
            role,
            kind: BlockKind::Code,
            title: None,
            source: source.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Ordered blocks produced once per execution and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl FromIterator<Block> for Document {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        Self::from_blocks(iter.into_iter().collect())
    }
}

impl Document {
    pub(crate) fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Step numbers in document order.
    pub fn step_numbers(&self) -> Vec<u32> {
        self.blocks
            .iter()
            .filter_map(|b| match b.role {
                BlockRole::StepCode { step_number } => Some(step_number),
                _ => None,
            })
            .collect()
    }

    /// The code block compiled for a given step, if present.
    pub fn step_code(&self, step_number: u32) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| b.role == BlockRole::StepCode { step_number })
    }

    /// Standalone program text: narrative as `#` comments, code verbatim.
    pub fn to_program(&self) -> String {
        let mut out = String::from("#!/usr/bin/env python\n# coding: utf-8\n");

        for block in &self.blocks {
            out.push('\n');
            if let Some(title) = &block.title {
                push_comment(&mut out, title);
                out.push('\n');
            }
            match block.kind {
                BlockKind::Narrative => push_comment(&mut out, &block.source),
                BlockKind::Code => {
                    out.push_str(&block.source);
                    if !block.source.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }

        out
    }

    /// nbformat v4 notebook JSON.
    pub fn to_notebook(&self) -> Value {
        let mut cells = Vec::new();

        for block in &self.blocks {
            if let Some(title) = &block.title {
                cells.push(markdown_cell(title));
            }
            match block.kind {
                BlockKind::Narrative => cells.push(markdown_cell(&block.source)),
                BlockKind::Code => cells.push(json!({
                    "cell_type": "code",
                    "execution_count": null,
                    "metadata": {},
                    "outputs": [],
                    "source": source_lines(&block.source),
                })),
            }
        }

        json!({
            "cells": cells,
            "metadata": {
                "kernelspec": {
                    "display_name": "Python 3",
                    "language": "python",
                    "name": "python3",
                },
                "language_info": { "name": "python" },
            },
            "nbformat": 4,
            "nbformat_minor": 4,
        })
    }
}

fn push_comment(out: &mut String, text: &str) {
    // Split on bare '\r' too: the interpreter treats it as a line break.
    for line in text.split(['\n', '\r']) {
        if line.is_empty() {
            out.push_str("#\n");
        } else {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn markdown_cell(text: &str) -> Value {
    json!({
        "cell_type": "markdown",
        "metadata": {},
        "source": source_lines(text),
    })
}

fn source_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::from_blocks(vec![
            Block::code(BlockRole::Preamble, "import os").with_title("# Title"),
            Block::narrative(BlockRole::StepHeader { step_number: 1 }, "## Step 1: Load"),
            Block::code(BlockRole::StepCode { step_number: 1 }, "print(1)\n"),
            Block::code(BlockRole::Closing, "print('done')").with_title("## Summary"),
        ])
    }

    #[test]
    fn program_comments_narrative_and_keeps_code() {
        let program = sample().to_program();
        assert!(program.contains("# # Title\n\nimport os\n"));
        assert!(program.contains("# ## Step 1: Load\n"));
        assert!(program.contains("\nprint(1)\n"));
        assert!(program.ends_with("print('done')\n"));
    }

    #[test]
    fn carriage_returns_do_not_escape_comments() {
        let doc = Document::from_blocks(vec![Block::narrative(
            BlockRole::Closing,
            "note\rprint('x')",
        )]);
        assert!(doc.to_program().contains("# note\n# print('x')\n"));
    }

    #[test]
    fn notebook_has_one_cell_per_block_and_title() {
        let nb = sample().to_notebook();
        let cells = nb["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0]["cell_type"], "markdown");
        assert_eq!(cells[1]["cell_type"], "code");
        assert_eq!(nb["nbformat"], 4);
    }

    #[test]
    fn step_lookup_uses_roles() {
        let doc = sample();
        assert_eq!(doc.step_numbers(), vec![1]);
        assert_eq!(doc.step_code(1).unwrap().source, "print(1)\n");
        assert!(doc.step_code(2).is_none());
    }
}
