//! Module for parsing and representing QBF and MAX-SC-QBF instances.
//!
//! Plain QBF files start with the dimension `n` followed by the upper
//! triangle of the coefficient matrix, one row per line (row `i` lists
//! columns `i..n`). Set-cover files add one ignored header line after the
//! dimension and `n` lines listing the members of each covering set before
//! the coefficient block.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which file layout (and which problem) an instance describes
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum InstanceKind {
    /// Unconstrained quadratic binary function
    Qbf,
    /// QBF maximization under a set-cover constraint
    SetCover,
}

impl std::fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceKind::Qbf => write!(f, "QBF"),
            InstanceKind::SetCover => write!(f, "MAX-SC-QBF"),
        }
    }
}

/// A parsed instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QbfInstance {
    /// Name of the instance (file stem when loaded from disk)
    pub name: String,
    pub kind: InstanceKind,
    /// Number of decision variables
    pub dimension: usize,
    /// Coefficient matrix; only the upper triangle is ever non-zero
    pub matrix: Vec<Vec<f64>>,
    /// Covering set of each variable (empty for plain QBF)
    pub sets: Vec<Vec<usize>>,
}

impl QbfInstance {
    /// Parse an instance file, failing on I/O errors or malformed content.
    ///
    /// Missing rows are zero-filled (or left as empty sets) rather than
    /// rejected.
    pub fn from_file<P: AsRef<Path>>(path: P, kind: InstanceKind) -> Result<Self, String> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Cannot open file {:?}: {}", path, e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "instance".to_string());
        Self::parse(&name, &text, kind)
    }

    /// Load an instance, degrading to [`QbfInstance::trivial`] on any error
    pub fn load_or_trivial<P: AsRef<Path>>(path: P, kind: InstanceKind) -> Self {
        match Self::from_file(&path, kind) {
            Ok(instance) => instance,
            Err(e) => {
                log::warn!("{}; falling back to a trivial 1-variable instance", e);
                let mut instance = Self::trivial(kind);
                instance.name = path
                    .as_ref()
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "trivial".to_string());
                instance
            }
        }
    }

    /// One variable, zero coefficient, one set covering element 0
    pub fn trivial(kind: InstanceKind) -> Self {
        let sets = match kind {
            InstanceKind::Qbf => Vec::new(),
            InstanceKind::SetCover => vec![vec![0]],
        };
        QbfInstance {
            name: "trivial".to_string(),
            kind,
            dimension: 1,
            matrix: vec![vec![0.0]],
            sets,
        }
    }

    /// Parse instance text
    pub fn parse(name: &str, text: &str, kind: InstanceKind) -> Result<Self, String> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        let header = lines.next().ok_or("Empty instance file")?;
        let dimension: usize = header
            .split_whitespace()
            .next()
            .unwrap_or("")
            .parse()
            .map_err(|_| format!("Invalid dimension: {:?}", header))?;

        let mut sets = Vec::new();
        if kind == InstanceKind::SetCover {
            // Set sizes; redundant with the member lists that follow
            lines.next();

            for i in 0..dimension {
                let members = match lines.next() {
                    Some(line) => line
                        .split_whitespace()
                        .map(|tok| {
                            tok.parse::<usize>()
                                .map_err(|_| format!("Invalid member {:?} in set {}", tok, i))
                        })
                        .collect::<Result<Vec<usize>, String>>()?,
                    None => {
                        log::warn!("Instance {}: set {} missing, left empty", name, i);
                        Vec::new()
                    }
                };
                let mut members = members;
                members.sort_unstable();
                members.dedup();
                sets.push(members);
            }
        }

        let mut matrix = vec![vec![0.0; dimension]; dimension];
        for (i, row) in matrix.iter_mut().enumerate() {
            let line = match lines.next() {
                Some(line) => line,
                None => {
                    log::warn!(
                        "Instance {}: coefficient row {} missing, using zeros from here on",
                        name,
                        i
                    );
                    break;
                }
            };

            let values = line
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>()
                        .map_err(|_| format!("Invalid coefficient {:?} in row {}", tok, i))
                })
                .collect::<Result<Vec<f64>, String>>()?;

            if values.len() != dimension - i {
                log::debug!(
                    "Instance {}: row {} has {} values (expected {})",
                    name,
                    i,
                    values.len(),
                    dimension - i
                );
            }

            for (offset, value) in values.into_iter().enumerate() {
                let col = i + offset;
                if col < dimension {
                    row[col] = value;
                }
            }
        }

        Ok(QbfInstance {
            name: name.to_string(),
            kind,
            dimension,
            matrix,
            sets,
        })
    }

    /// Build a plain QBF instance from upper-triangular rows (row `i` holds
    /// columns `i..n`)
    pub fn from_upper_triangular(name: &str, rows: &[Vec<f64>]) -> Self {
        let dimension = rows.len();
        let mut matrix = vec![vec![0.0; dimension]; dimension];
        for (i, row) in rows.iter().enumerate() {
            for (offset, &value) in row.iter().enumerate() {
                if i + offset < dimension {
                    matrix[i][i + offset] = value;
                }
            }
        }
        QbfInstance {
            name: name.to_string(),
            kind: InstanceKind::Qbf,
            dimension,
            matrix,
            sets: Vec::new(),
        }
    }

    /// Turn this instance into a set-cover instance with the given sets
    pub fn with_sets(mut self, sets: Vec<Vec<usize>>) -> Self {
        self.kind = InstanceKind::SetCover;
        self.sets = sets
            .into_iter()
            .map(|mut s| {
                s.sort_unstable();
                s.dedup();
                s
            })
            .collect();
        self.sets.resize(self.dimension, Vec::new());
        self
    }

    #[inline]
    pub fn coefficient(&self, i: usize, j: usize) -> f64 {
        self.matrix[i][j]
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let n = self.dimension;
        let mut nonzero = 0usize;
        let mut coefficient_sum = 0.0;
        for row in &self.matrix {
            for &value in row {
                if value != 0.0 {
                    nonzero += 1;
                }
                coefficient_sum += value;
            }
        }
        let upper_cells = n * (n + 1) / 2;
        let density = if upper_cells == 0 {
            0.0
        } else {
            nonzero as f64 / upper_cells as f64
        };

        let diagonal: Vec<f64> = (0..n).map(|i| self.coefficient(i, i)).collect();
        let diagonal_min = diagonal.iter().cloned().fold(f64::INFINITY, f64::min);
        let diagonal_max = diagonal.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let (num_sets, mean_set_size) = match self.kind {
            InstanceKind::Qbf => (0, 0.0),
            InstanceKind::SetCover => {
                let total: usize = self.sets.iter().map(Vec::len).sum();
                let mean = if self.sets.is_empty() {
                    0.0
                } else {
                    total as f64 / self.sets.len() as f64
                };
                (self.sets.len(), mean)
            }
        };

        InstanceStatistics {
            name: self.name.clone(),
            kind: self.kind,
            dimension: n,
            nonzero_coefficients: nonzero,
            density,
            coefficient_sum,
            diagonal_min: if n == 0 { 0.0 } else { diagonal_min },
            diagonal_max: if n == 0 { 0.0 } else { diagonal_max },
            num_sets,
            mean_set_size,
        }
    }
}

/// Statistics about a QBF instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub kind: InstanceKind,
    pub dimension: usize,
    pub nonzero_coefficients: usize,
    /// Share of non-zero cells in the upper triangle
    pub density: f64,
    pub coefficient_sum: f64,
    pub diagonal_min: f64,
    pub diagonal_max: f64,
    pub num_sets: usize,
    pub mean_set_size: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {} ({})", self.name, self.kind)?;
        writeln!(f, "  Variables: {}", self.dimension)?;
        writeln!(
            f,
            "  Non-zero coefficients: {} (density {:.2}%)",
            self.nonzero_coefficients,
            self.density * 100.0
        )?;
        writeln!(f, "  Coefficient sum: {:.2}", self.coefficient_sum)?;
        writeln!(
            f,
            "  Diagonal range: [{:.2}, {:.2}]",
            self.diagonal_min, self.diagonal_max
        )?;
        if self.kind == InstanceKind::SetCover {
            writeln!(f, "  Covering sets: {}", self.num_sets)?;
            writeln!(f, "  Mean set size: {:.2}", self.mean_set_size)?;
        }
        Ok(())
    }
}
