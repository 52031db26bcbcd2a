//! Render a solver decision into an output dataset

use crate::anonymization::microaggregation;
use crate::anonymization::solver::{AttributeRole, AttributeSpec, EngineRequest, Solution};
use crate::domain::{AnonymizationError, ColumnSpec, DataType, Dataset, SUPPRESSED_VALUE};
use std::collections::HashMap;

/// Apply a solution to `dataset`
///
/// Row `i` of the result is row `i` of the input. Suppressed records keep
/// their insensitive cells and lose everything else. Identifying attributes
/// are `*` everywhere. Microaggregated attributes take the aggregate of the
/// class their record falls into.
///
/// Protected columns become `STRING` columns unless `retain_data_type` is
/// set.
pub fn apply(
    dataset: &Dataset,
    request: &EngineRequest,
    solution: &Solution,
    retain_data_type: bool,
) -> Result<Dataset, AnonymizationError> {
    let rows = dataset.row_count();
    if solution.suppressed.len() != rows {
        return Err(AnonymizationError::unexpected(
            "solution does not match the dataset",
            format!(
                "{} suppression flags for {} records",
                solution.suppressed.len(),
                rows
            ),
        ));
    }

    let lattice = request.lattice_attributes();
    let levels: HashMap<usize, usize> = lattice
        .iter()
        .copied()
        .zip(solution.levels.iter().copied())
        .collect();

    // generalized lattice key of each released record
    let mut classes: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
    for row in (0..rows).filter(|&r| !solution.suppressed[r]) {
        let key = lattice
            .iter()
            .map(|position| generalized(request, &levels, *position, dataset, row))
            .collect();
        classes.entry(key).or_default().push(row);
    }

    let mut aggregates: HashMap<(usize, usize), String> = HashMap::new();
    for (position, spec) in request.attributes.iter().enumerate() {
        let Some(micro) = spec.microaggregation else {
            continue;
        };
        if spec.role != AttributeRole::QuasiIdentifying {
            continue;
        }
        for members in classes.values() {
            let values: Vec<&str> = members
                .iter()
                .map(|&row| dataset.cell(row, spec.column))
                .collect();
            let value = microaggregation::aggregate(
                &spec.name,
                micro.function,
                spec.data_type,
                &values,
                micro.ignore_missing_data,
            )?;
            for &row in members {
                aggregates.insert((position, row), value.clone());
            }
        }
    }

    let output_rows = (0..rows)
        .map(|row| {
            request
                .attributes
                .iter()
                .enumerate()
                .map(|(position, spec)| {
                    let original = dataset.cell(row, spec.column);
                    match spec.role {
                        AttributeRole::Insensitive => original.to_string(),
                        AttributeRole::Identifying => SUPPRESSED_VALUE.to_string(),
                        AttributeRole::QuasiIdentifying if solution.suppressed[row] => {
                            SUPPRESSED_VALUE.to_string()
                        }
                        AttributeRole::QuasiIdentifying => match aggregates.get(&(position, row)) {
                            Some(value) => value.clone(),
                            None => generalized(request, &levels, position, dataset, row).to_string(),
                        },
                    }
                })
                .collect()
        })
        .collect();

    let columns = request
        .attributes
        .iter()
        .map(|spec| ColumnSpec::new(spec.name.clone(), output_data_type(spec, retain_data_type)))
        .collect();

    Ok(Dataset {
        columns,
        rows: output_rows,
    })
}

fn output_data_type(spec: &AttributeSpec, retain_data_type: bool) -> DataType {
    let keeps_type = match spec.role {
        AttributeRole::Insensitive => true,
        AttributeRole::Identifying => false,
        AttributeRole::QuasiIdentifying if !retain_data_type => false,
        AttributeRole::QuasiIdentifying => match spec.microaggregation {
            Some(micro) => micro.function.keeps_data_type(),
            None => spec
                .hierarchy
                .as_ref()
                .map_or(false, |hierarchy| hierarchy.has_typed_labels()),
        },
    };
    if keeps_type {
        spec.data_type
    } else {
        DataType::String
    }
}

fn generalized<'a>(
    request: &'a EngineRequest,
    levels: &HashMap<usize, usize>,
    position: usize,
    dataset: &'a Dataset,
    row: usize,
) -> &'a str {
    let spec = &request.attributes[position];
    match (&spec.hierarchy, levels.get(&position)) {
        (Some(hierarchy), Some(&level)) => hierarchy.generalize(dataset.cell(row, spec.column), level),
        _ => SUPPRESSED_VALUE,
    }
}
