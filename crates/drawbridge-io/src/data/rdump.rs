//! Legacy R dump encoding (`name <- value`).
//!
//! Multi-dimensional arrays are written as `structure(c(...), .Dim = c(...))`
//! with elements in column-major order, which is what the dump reader expects.

use std::io::{self, Write};

use drawbridge_core::data::{DataMap, DataValue, ElementKind};

pub(crate) fn write_rdump<W: Write>(map: &DataMap, w: &mut W) -> io::Result<()> {
    for (name, value) in map.iter() {
        writeln!(w, "{} <- {}", name, encode(value))?;
    }
    Ok(())
}

fn encode(value: &DataValue) -> String {
    // Callers validate shapes before encoding.
    let shape = value.shape().unwrap_or_default();
    let real = value.element_kind() == ElementKind::Real;
    let leaves = value.leaves();

    match shape.len() {
        0 => format_leaf(leaves[0], real),
        1 if shape[0] == 0 => (if real { "double(0)" } else { "integer(0)" }).to_string(),
        1 => format!("c({})", join(&leaves, real)),
        _ => {
            let ordered: Vec<&DataValue> = column_major(&shape)
                .into_iter()
                .map(|i| leaves[i])
                .collect();
            let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
            format!(
                "structure(c({}), .Dim = c({}))",
                join(&ordered, real),
                dims.join(", ")
            )
        }
    }
}

fn join(leaves: &[&DataValue], real: bool) -> String {
    leaves
        .iter()
        .map(|l| format_leaf(l, real))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_leaf(leaf: &DataValue, real: bool) -> String {
    match leaf {
        DataValue::Int(i) if real => format_real(*i as f64),
        DataValue::Int(i) => i.to_string(),
        DataValue::Bool(b) if real => format_real(f64::from(u8::from(*b))),
        DataValue::Bool(b) => u8::from(*b).to_string(),
        DataValue::Real(x) => format_real(*x),
        DataValue::Array(_) => String::new(),
    }
}

fn format_real(x: f64) -> String {
    if x.is_nan() {
        "NaN".into()
    } else if x.is_infinite() {
        (if x > 0.0 { "Inf" } else { "-Inf" }).into()
    } else {
        // Debug formatting is shortest-roundtrip and keeps a ".0" on whole values.
        format!("{x:?}")
    }
}

/// Row-major leaf indexes visited in column-major order.
fn column_major(shape: &[usize]) -> Vec<usize> {
    let total: usize = shape.iter().product();
    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    let mut out = Vec::with_capacity(total);
    let mut index = vec![0usize; shape.len()];
    for _ in 0..total {
        out.push(index.iter().zip(&strides).map(|(i, s)| i * s).sum());
        // first axis varies fastest
        for axis in 0..shape.len() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}
