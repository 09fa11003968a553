//! The strategy matrix and its text formats.
//!
//! Legacy format:
//!
//! ```text
//! strategy <id>
//! r0c0 r0c1 ... r0c(goal-1)
//! ...
//! ```

use crate::error::{ConvertError, ConvertResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

pub type Roll = i8;

/// A validated `goal x goal` grid of roll counts for one submission.
///
/// Row = own score, column = opponent score, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMatrix {
    pub id: String,
    pub name: String,
    pub goal: u32,
    cells: Vec<Roll>,
}

impl StrategyMatrix {
    /// Build a matrix from row-major cells. Fails if the cell count is not `goal²`.
    pub fn from_cells(
        id: impl Into<String>,
        name: impl Into<String>,
        goal: u32,
        cells: Vec<Roll>,
    ) -> ConvertResult<Self> {
        let expected = (goal as usize) * (goal as usize);
        if cells.len() != expected {
            return Err(ConvertError::config(format!(
                "matrix for goal {goal} needs {expected} cells, got {}",
                cells.len()
            )));
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            goal,
            cells,
        })
    }

    pub fn constant(
        id: impl Into<String>,
        name: impl Into<String>,
        goal: u32,
        roll: Roll,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            goal,
            cells: vec![roll; (goal as usize) * (goal as usize)],
        }
    }

    pub fn get(&self, own: u32, opponent: u32) -> Option<Roll> {
        if own >= self.goal || opponent >= self.goal {
            return None;
        }
        self.cells
            .get((own as usize) * (self.goal as usize) + opponent as usize)
            .copied()
    }

    pub fn cells(&self) -> &[Roll] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Roll]> {
        self.cells.chunks(self.goal as usize)
    }

    pub fn to_legacy(&self) -> String {
        let mut out = format!("strategy {}\n", self.id);
        for row in self.rows() {
            let line = row
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Parse the legacy format. The format has no name; the id doubles as one.
    pub fn from_legacy(text: &str, goal: u32) -> Result<Self, String> {
        let mut lines = text.lines();
        let header = lines.next().ok_or("empty file")?;
        let id = header
            .strip_prefix("strategy")
            .map(str::trim)
            .ok_or("missing `strategy <id>` header")?
            .to_string();

        let mut cells = Vec::with_capacity((goal as usize) * (goal as usize));
        for r in 0..goal {
            let line = lines
                .next()
                .ok_or_else(|| format!("missing row {r} of {goal}"))?;
            let row: Vec<Roll> = line
                .split_whitespace()
                .map(|t| t.parse::<Roll>())
                .collect::<Result<_, _>>()
                .map_err(|e| format!("row {r}: {e}"))?;
            if row.len() != goal as usize {
                return Err(format!(
                    "row {r} has {} entries, expected {goal}",
                    row.len()
                ));
            }
            cells.extend(row);
        }
        Ok(Self {
            name: id.clone(),
            id,
            goal,
            cells,
        })
    }

    pub fn write_legacy(&self, path: &Path) -> ConvertResult<()> {
        std::fs::write(path, self.to_legacy()).map_err(|e| ConvertError::path_access(path, e))
    }

    pub fn read_legacy(path: &Path, goal: u32) -> ConvertResult<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConvertError::path_access(path, e))?;
        Self::from_legacy(&text, goal).map_err(|message| ConvertError::Format {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Regenerate a submission that returns exactly this matrix.
    pub fn to_python_source(&self, entry_point: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "PLAYER_NAME = {}", python_str(&self.name));
        let _ = writeln!(out, "def {entry_point}(score, opponent_score):");
        out.push_str("    return [");
        for (r, row) in self.rows().enumerate() {
            if r > 0 {
                out.push_str(",\n            ");
            }
            out.push('[');
            let line = row
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&line);
            out.push(']');
        }
        out.push_str("][score][opponent_score]\n");
        out
    }
}

fn python_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
