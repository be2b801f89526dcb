//! Header row → logical variables.
//!
//! A multi-dimensional variable is written as consecutive columns sharing a
//! base name with 1-based indices appended (`theta.1.2`, or `theta[1,2]`).
//! Those columns fold back into one `VariableMeta` whose dims are the largest
//! index seen on each axis.

use std::collections::HashSet;

use drawbridge_core::draws::{
    is_diagnostic_column, DiagnosticColumn, DrawsSchema, VariableMeta,
};

/// Split a column name into base name and element indices. Names whose
/// suffix is not purely numeric are treated as scalars.
pub fn split_column_name(name: &str) -> (&str, Vec<usize>) {
    if let Some(open) = name.find('[') {
        if let Some(inner) = name[open + 1..].strip_suffix(']') {
            if let Some(idx) = parse_indices(inner.split(',')) {
                return (&name[..open], idx);
            }
        }
        return (name, Vec::new());
    }
    match name.split_once('.') {
        Some((base, rest)) if !base.is_empty() => match parse_indices(rest.split('.')) {
            Some(idx) => (base, idx),
            None => (name, Vec::new()),
        },
        _ => (name, Vec::new()),
    }
}

fn parse_indices<'a>(parts: impl Iterator<Item = &'a str>) -> Option<Vec<usize>> {
    let mut out = Vec::new();
    for p in parts {
        let i: usize = p.trim().parse().ok()?;
        if i == 0 {
            return None;
        }
        out.push(i);
    }
    (!out.is_empty()).then_some(out)
}

/// Build the logical schema for a header. Errors describe the offending column.
pub fn build_schema(columns: &[String]) -> Result<DrawsSchema, String> {
    let mut variables: Vec<VariableMeta> = Vec::new();
    let mut diagnostics = Vec::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    // element indices of the variable currently being accumulated
    let mut current: Option<(VariableMeta, Vec<Vec<usize>>)> = None;

    for (col, raw) in columns.iter().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(format!("column {} has an empty name", col + 1));
        }
        if is_diagnostic_column(raw) {
            if let Some(done) = current.take() {
                variables.push(finish_variable(done)?);
            }
            if !seen_names.insert(raw.to_string()) {
                return Err(format!("duplicate column '{raw}'"));
            }
            diagnostics.push(DiagnosticColumn {
                name: raw.to_string(),
                column: col,
            });
            continue;
        }

        let (base, idx) = split_column_name(raw);
        let continues = matches!(
            &current,
            Some((meta, elems)) if meta.name == base && !idx.is_empty() && elems[0].len() == idx.len()
        );
        if continues {
            if let Some((meta, elems)) = current.as_mut() {
                meta.columns.push(col);
                elems.push(idx);
            }
            continue;
        }

        if let Some(done) = current.take() {
            variables.push(finish_variable(done)?);
        }
        if !seen_names.insert(base.to_string()) {
            return Err(format!(
                "column '{raw}' repeats variable '{base}' outside its contiguous block"
            ));
        }
        if idx.is_empty() {
            variables.push(VariableMeta::scalar(base, col));
        } else {
            let meta = VariableMeta {
                name: base.to_string(),
                dims: Vec::new(),
                columns: vec![col],
            };
            current = Some((meta, vec![idx]));
        }
    }
    if let Some(done) = current.take() {
        variables.push(finish_variable(done)?);
    }

    Ok(DrawsSchema {
        columns: columns.iter().map(|c| c.trim().to_string()).collect(),
        variables,
        diagnostics,
    })
}

fn finish_variable((mut meta, elems): (VariableMeta, Vec<Vec<usize>>)) -> Result<VariableMeta, String> {
    let rank = elems[0].len();
    let mut dims = vec![0usize; rank];
    for e in &elems {
        for (d, &i) in dims.iter_mut().zip(e) {
            *d = (*d).max(i);
        }
    }
    let expected: usize = dims.iter().product();
    let unique: HashSet<&Vec<usize>> = elems.iter().collect();
    if expected != elems.len() || unique.len() != elems.len() {
        return Err(format!(
            "variable '{}' has {} columns, which do not fill dimensions {:?}",
            meta.name,
            elems.len(),
            dims
        ));
    }
    meta.dims = dims;
    Ok(meta)
}
