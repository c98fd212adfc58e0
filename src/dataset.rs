//! Tabular datasets of observed points.
//!
//! A dataset is an ordered array of points sharing one schema: N named
//! independent variables followed by the dependent variables, plus a set
//! of per-dataset system values (scalar experimental conditions).

use std::fs;
use std::path::Path;

use crate::error::AtollError;

/// One observation: independent inputs and dependent outputs.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    indeps: Vec<f64>,
    depnds: Vec<f64>,
}

impl Point {
    pub fn new(indeps: Vec<f64>, depnds: Vec<f64>) -> Self {
        Self { indeps, depnds }
    }

    #[inline]
    pub fn indeps(&self) -> &[f64] {
        &self.indeps
    }

    #[inline]
    pub fn depnds(&self) -> &[f64] {
        &self.depnds
    }

    /// The dependent value at index `n`, NaN when out of range.
    #[inline]
    pub fn depnd(&self, n: usize) -> f64 {
        self.depnds.get(n).copied().unwrap_or(f64::NAN)
    }
}

/// An ordered array of points with named columns and system values.
#[derive(Clone, Debug, Default)]
pub struct DataSet {
    indep_names: Vec<String>,
    depnd_names: Vec<String>,
    points: Vec<Point>,
    sys_vals: Vec<f64>,
}

impl DataSet {
    pub fn new(
        indep_names: Vec<String>,
        depnd_names: Vec<String>,
        points: Vec<Point>,
    ) -> Self {
        Self {
            indep_names,
            depnd_names,
            points,
            sys_vals: Vec::new(),
        }
    }

    /// Read a whitespace-separated data file.
    ///
    /// The first line holds N+1 column names, the last being the dependent
    /// variable. Every following line holds N+1 floats; a line with fewer
    /// fields terminates parsing.
    pub fn read(path: &Path) -> Result<Self, AtollError> {
        let text = fs::read_to_string(path)
            .map_err(|e| AtollError::Io(format!("{}: {e}", path.display())))?;
        Self::parse(&text)
    }

    /// Parse data-file text. See [`DataSet::read`] for the format.
    pub fn parse(text: &str) -> Result<Self, AtollError> {
        let mut lines = text.lines();
        let header = lines.next().unwrap_or("");
        let names: Vec<&str> = header.split_whitespace().collect();
        if names.len() < 2 {
            return Err(AtollError::Parse {
                field: "header".into(),
                value: header.into(),
            });
        }

        let ncols = names.len();
        let indep_names: Vec<String> =
            names[..ncols - 1].iter().map(|s| s.to_string()).collect();
        let depnd_names = vec![names[ncols - 1].to_string()];

        let mut points = Vec::new();
        for line in lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < ncols {
                break;
            }
            let mut vals = Vec::with_capacity(ncols);
            for f in &fields[..ncols] {
                let v: f64 = f.parse().map_err(|_| AtollError::Parse {
                    field: "data value".into(),
                    value: f.to_string(),
                })?;
                vals.push(v);
            }
            let depnd = vals.split_off(ncols - 1);
            points.push(Point::new(vals, depnd));
        }

        Ok(Self::new(indep_names, depnd_names, points))
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of independent variables.
    #[inline]
    pub fn dims(&self) -> usize {
        self.indep_names.len()
    }

    #[inline]
    pub fn point(&self, p: usize) -> &Point {
        &self.points[p]
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn indep_names(&self) -> &[String] {
        &self.indep_names
    }

    #[inline]
    pub fn depnd_names(&self) -> &[String] {
        &self.depnd_names
    }

    #[inline]
    pub fn sys_vals(&self) -> &[f64] {
        &self.sys_vals
    }

    pub fn set_sys_vals(&mut self, vals: Vec<f64>) {
        self.sys_vals = vals;
    }

    /// Split off every `stride`-th point into a second dataset.
    ///
    /// Used to hold out a test set when no separate test file is given.
    pub fn split_holdout(&self, stride: usize) -> (DataSet, DataSet) {
        let mut train = Vec::new();
        let mut test = Vec::new();
        for (i, p) in self.points.iter().enumerate() {
            if stride > 0 && i % stride == stride - 1 {
                test.push(p.clone());
            } else {
                train.push(p.clone());
            }
        }
        let mut a = DataSet::new(self.indep_names.clone(), self.depnd_names.clone(), train);
        let mut b = DataSet::new(self.indep_names.clone(), self.depnd_names.clone(), test);
        a.sys_vals = self.sys_vals.clone();
        b.sys_vals = self.sys_vals.clone();
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "x0 x1 y\n\
                          0.0 1.0 1.0\n\
                          0.5 1.0 1.25\n\
                          1.0 2.0 3.0\n";

    #[test]
    fn parse_basic() {
        let ds = DataSet::parse(SAMPLE).unwrap();
        assert_eq!(ds.dims(), 2);
        assert_eq!(ds.num_points(), 3);
        assert_eq!(ds.indep_names(), &["x0".to_string(), "x1".to_string()]);
        assert_eq!(ds.depnd_names(), &["y".to_string()]);
        assert_eq!(ds.point(1).indeps(), &[0.5, 1.0]);
        assert_eq!(ds.point(2).depnd(0), 3.0);
    }

    #[test]
    fn short_line_terminates() {
        let text = "x y\n1.0 2.0\n3.0\n5.0 6.0\n";
        let ds = DataSet::parse(text).unwrap();
        assert_eq!(ds.num_points(), 1);
    }

    #[test]
    fn exponent_forms() {
        let text = "x y\n1e-3 2.5E2\n";
        let ds = DataSet::parse(text).unwrap();
        assert_eq!(ds.point(0).indeps()[0], 1e-3);
        assert_eq!(ds.point(0).depnd(0), 250.0);
    }

    #[test]
    fn bad_value_is_parse_error() {
        let text = "x y\n1.0 froot\n";
        let err = DataSet::parse(text).unwrap_err();
        assert!(matches!(err, AtollError::Parse { .. }));
    }

    #[test]
    fn holdout_split() {
        let ds = DataSet::parse(SAMPLE).unwrap();
        let (train, test) = ds.split_holdout(3);
        assert_eq!(train.num_points(), 2);
        assert_eq!(test.num_points(), 1);
        assert_eq!(test.point(0).indeps(), &[1.0, 2.0]);
    }
}
