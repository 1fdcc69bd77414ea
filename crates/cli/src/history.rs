//! Evaluation history export (CSV via polars) and its summary for `report`.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use nmsearch::point::{Cache, EvalStatus};
use polars::prelude::*;
use serde::Serialize;

/// One row per cached point: `tag, status, f, h, x0..x{n-1}`, in tag order.
///
/// Undefined or non-finite values are written as nulls.
pub fn history_frame(cache: &Cache) -> PolarsResult<DataFrame> {
    let mut rows: Vec<_> = cache.iter().map(|(_, p)| p).collect();
    rows.sort_by_key(|p| p.tag);
    let finite = |v: f64| v.is_finite().then_some(v);
    let tags: Vec<u64> = rows.iter().map(|p| p.tag).collect();
    let status: Vec<&str> = rows
        .iter()
        .map(|p| match p.status {
            EvalStatus::Ok => "ok",
            EvalStatus::Failed => "failed",
        })
        .collect();
    let fs: Vec<Option<f64>> = rows.iter().map(|p| finite(p.f)).collect();
    let hs: Vec<Option<f64>> = rows.iter().map(|p| finite(p.h)).collect();
    let mut df = df!(
        "tag" => tags,
        "status" => status,
        "f" => fs,
        "h" => hs
    )?;
    let dim = rows.iter().map(|p| p.dim()).max().unwrap_or(0);
    for i in 0..dim {
        let xi: Vec<Option<f64>> = rows.iter().map(|p| p.x.get(i).copied()).collect();
        df.with_column(Series::new(format!("x{i}").into(), xi))?;
    }
    Ok(df)
}

pub fn write_history(cache: &Cache, path: &Path) -> Result<()> {
    let mut df = history_frame(cache)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating history dir {}", parent.display()))?;
        }
    }
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(rows = df.height(), path = %path.display(), "history written");
    Ok(())
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct HistorySummary {
    pub rows: usize,
    pub failed: usize,
    pub feasible: usize,
    pub best_feasible_f: Option<f64>,
}

/// Read a history CSV back and summarize it.
pub fn summarize(path: &Path) -> Result<HistorySummary> {
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(1000))
        .finish()
        .with_context(|| format!("reading {}", path.display()))?
        .collect()?;
    let failed = df
        .clone()
        .lazy()
        .filter(col("status").eq(lit("failed")))
        .collect()?
        .height();
    let feasible = df
        .clone()
        .lazy()
        .filter(col("h").cast(DataType::Float64).lt_eq(lit(0.0)))
        .collect()?;
    let f = feasible.column("f")?.cast(&DataType::Float64)?;
    Ok(HistorySummary {
        rows: df.height(),
        failed,
        feasible: feasible.height(),
        best_feasible_f: f.f64()?.min(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use nmsearch::point::EvalPoint;
    use tempfile::tempdir;

    #[test]
    fn history_round_trips_through_csv() {
        let mut cache = Cache::new();
        cache.insert(EvalPoint::evaluated(dvector![0.0, 1.0], 3.0, 0.0));
        cache.insert(EvalPoint::evaluated(dvector![1.0, 1.0], 1.5, 0.0));
        cache.insert(EvalPoint::evaluated(dvector![2.0, 1.0], 0.5, 2.0));
        cache.insert(EvalPoint::failed(dvector![3.0, 1.0]));

        let df = history_frame(&cache).unwrap();
        assert_eq!(df.shape(), (4, 6));

        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/history.csv");
        write_history(&cache, &path).unwrap();
        let s = summarize(&path).unwrap();
        assert_eq!(s.rows, 4);
        assert_eq!(s.failed, 1);
        assert_eq!(s.feasible, 2);
        assert_eq!(s.best_feasible_f, Some(1.5));
    }
}
