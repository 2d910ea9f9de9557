//! Reference population: the SHAP-ready training matrix
//!
//! Loaded once at startup from CSV. The header row must reproduce the model's
//! feature schema exactly (same names, same order); every cell must be a
//! finite number.

use std::io::Read;
use std::path::Path;

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::{Artifact, EngineError, EngineResult};
use crate::features::{compute_layout_hash, FeatureSchema};

/// Rows x features matrix in schema column order
#[derive(Debug, Clone)]
pub struct ReferencePopulation {
    matrix: Array2<f64>,
}

impl ReferencePopulation {
    /// Load population CSV
    pub fn load(path: &Path, schema: &FeatureSchema) -> EngineResult<Self> {
        log::info!("Loading reference population from: {}", path.display());

        let file = std::fs::File::open(path).map_err(|e| {
            EngineError::artifact(Artifact::ReferenceData, format!("{}: {}", path.display(), e))
        })?;

        let population = Self::from_reader(file, schema)?;
        log::info!(
            "Reference population loaded: {} rows x {} features",
            population.len(),
            population.feature_count()
        );
        Ok(population)
    }

    pub fn from_reader<R: Read>(reader: R, schema: &FeatureSchema) -> EngineResult<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv
            .headers()
            .map_err(|e| EngineError::artifact(Artifact::ReferenceData, e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        check_header(&headers, schema)?;

        let mut rows = Vec::new();
        for (i, record) in csv.records().enumerate() {
            // +2: one-based, plus the header line
            let line = i + 2;
            let record = record.map_err(|e| {
                EngineError::artifact(Artifact::ReferenceData, format!("line {}: {}", line, e))
            })?;

            let row = record
                .iter()
                .zip(schema.names())
                .map(|(cell, name)| parse_cell(cell, name, line))
                .collect::<EngineResult<Vec<f64>>>()?;
            rows.push(row);
        }

        Self::from_rows(schema, rows)
    }

    /// Build from rows already in schema order
    pub fn from_rows(schema: &FeatureSchema, rows: Vec<Vec<f64>>) -> EngineResult<Self> {
        if rows.is_empty() {
            return Err(EngineError::artifact(Artifact::ReferenceData, "reference population is empty"));
        }

        let width = schema.len();
        let height = rows.len();
        let mut flat = Vec::with_capacity(width * height);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(EngineError::artifact(
                    Artifact::ReferenceData,
                    format!("row {} has {} values, schema has {}", i, row.len(), width),
                ));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::artifact(
                    Artifact::ReferenceData,
                    format!("row {} contains a non-finite value", i),
                ));
            }
            flat.extend(row);
        }

        let matrix = Array2::from_shape_vec((height, width), flat)
            .map_err(|e| EngineError::artifact(Artifact::ReferenceData, e.to_string()))?;
        Ok(Self { matrix })
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    pub fn feature_count(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> {
        self.matrix.outer_iter()
    }

    /// Deterministic stride sample of at most `limit` rows.
    ///
    /// Returns the full matrix when the population already fits.
    pub fn background(&self, limit: usize) -> Array2<f64> {
        let rows = self.len();
        let limit = limit.max(1);
        if rows <= limit {
            return self.matrix.clone();
        }

        let step = rows as f64 / limit as f64;
        let indices: Vec<usize> = (0..limit)
            .map(|i| ((i as f64 * step) as usize).min(rows - 1))
            .collect();
        self.matrix.select(Axis(0), &indices)
    }
}

fn check_header(headers: &[String], schema: &FeatureSchema) -> EngineResult<()> {
    let hash = compute_layout_hash(headers);
    if hash == schema.fingerprint() {
        return Ok(());
    }

    let missing: Vec<&str> = schema
        .names()
        .iter()
        .filter(|n| !headers.contains(n))
        .map(String::as_str)
        .collect();
    let unexpected: Vec<&str> = headers
        .iter()
        .filter(|h| schema.index_of(h).is_none())
        .map(String::as_str)
        .collect();

    let detail = if missing.is_empty() && unexpected.is_empty() {
        "columns are out of order".to_string()
    } else {
        format!("missing [{}], unexpected [{}]", missing.join("; "), unexpected.join("; "))
    };

    Err(EngineError::artifact(
        Artifact::ReferenceData,
        format!(
            "header layout {:08x} does not match model schema {:08x}: {}",
            hash,
            schema.fingerprint(),
            detail
        ),
    ))
}

fn parse_cell(cell: &str, name: &str, line: usize) -> EngineResult<f64> {
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(EngineError::artifact(
            Artifact::ReferenceData,
            format!("line {}, column '{}': '{}' is not a finite number", line, name, cell),
        )),
    }
}
