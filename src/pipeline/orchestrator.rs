//! Phase orchestration: data preparation, stage training, chained prediction.
//!
//! Training walks the phase's stages in dependency order and trains each one
//! on historical values (including the historical values of prerequisite
//! categories). Prediction walks the same order, but dependent stages read
//! their prerequisites' *predicted* values from the `PredictionContext`.
//!
//! A stage that fails to train does not stop the others; stages depending on
//! it are skipped, and the resulting `PhaseModels` refuses to predict.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{HistoricalSource, HistoricalTable, IncrementTable, apply_length_weights, index_to_present};
use crate::domain::{NewProject, Phase, is_attribute};
use crate::error::AppError;
use crate::fit::{StageModel, TrainOptions, train_stage};
use crate::pipeline::context::PredictionContext;
use crate::pipeline::schema::{PhaseSchema, StageDecl};

/// How raw records become the historical table.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub present_year: i32,
    pub increments: Option<IncrementTable>,
    pub length_weighting: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            present_year: 2025,
            increments: None,
            length_weighting: true,
        }
    }
}

/// A stage that could not be trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub category: String,
    pub exit_code: u8,
    pub reason: String,
}

/// Every trained stage of one phase, plus the schema used to train them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseModels {
    pub phase: Phase,
    pub trained_at: DateTime<Utc>,
    pub schema: PhaseSchema,
    pub models: BTreeMap<String, StageModel>,
    pub failures: Vec<StageFailure>,
}

impl PhaseModels {
    /// Trained stages in execution order.
    pub fn ordered(&self) -> Result<Vec<&StageModel>, AppError> {
        Ok(self
            .schema
            .execution_order()?
            .into_iter()
            .filter_map(|decl| self.models.get(decl.category()))
            .collect())
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Load records, index costs to present value and apply length weights.
pub fn prepare_data(source: &dyn HistoricalSource, opts: &PrepareOptions) -> Result<HistoricalTable, AppError> {
    let records = source.load()?;
    let mut samples = records.samples;
    log::info!("Loaded {} unit records from {}", samples.len(), source.describe());

    if let Some(increments) = &opts.increments {
        let n = index_to_present(&mut samples, increments, opts.present_year);
        log::info!("Indexed {n} records to {} prices", opts.present_year);
    }
    if opts.length_weighting {
        let n = apply_length_weights(&mut samples);
        log::debug!("Length-weighted costs across {n} projects");
    }

    Ok(HistoricalTable::new(records.cost_columns, samples))
}

/// Train every stage of `phase` on `table`.
pub fn train_models(table: &HistoricalTable, phase: Phase, opts: &TrainOptions) -> Result<PhaseModels, AppError> {
    let schema = PhaseSchema::for_phase(phase);
    let order = schema.execution_order()?;
    schema.validate_columns(table)?;

    log::info!(
        "Training {} stages for {} on {} records ({} projects)",
        order.len(),
        phase.display_name(),
        table.len(),
        table.project_count()
    );

    let mut models = BTreeMap::new();
    let mut failures: Vec<StageFailure> = Vec::new();

    for decl in &order {
        let category = decl.category();
        if let Some(dep) = decl.depends_on.iter().find(|d| failures.iter().any(|f| &f.category == *d)) {
            log::warn!("{category}: skipped, prerequisite '{dep}' has no model");
            failures.push(StageFailure {
                category: category.to_string(),
                exit_code: 3,
                reason: format!("prerequisite '{dep}' failed"),
            });
            continue;
        }

        log::info!("{category} ({})", decl.preparation.label());
        let result = table
            .frame(&decl.columns(), &decl.preparation)
            .and_then(|frame| train_stage(&frame, &decl.stage, opts));
        match result {
            Ok(model) => {
                models.insert(category.to_string(), model);
            }
            Err(err) => {
                log::error!("{category}: training failed: {}", err.message());
                failures.push(StageFailure {
                    category: category.to_string(),
                    exit_code: err.exit_code(),
                    reason: err.message().to_string(),
                });
            }
        }
    }

    if models.is_empty() {
        return Err(AppError::new(
            3,
            format!("No stage of {} could be trained.", phase.display_name()),
        ));
    }

    Ok(PhaseModels {
        phase,
        trained_at: Utc::now(),
        schema,
        models,
        failures,
    })
}

/// Predict every category of the phase for a new project.
pub fn predict(models: &PhaseModels, project: &NewProject) -> Result<BTreeMap<String, f64>, AppError> {
    if !models.is_complete() {
        let missing: Vec<&str> = models.failures.iter().map(|f| f.category.as_str()).collect();
        return Err(AppError::new(
            3,
            format!("Cannot predict: no trained model for {}.", missing.join(", ")),
        ));
    }

    let mut ctx = PredictionContext::new();
    for decl in models.schema.execution_order()? {
        let category = decl.category();
        let model = models
            .models
            .get(category)
            .ok_or_else(|| AppError::new(3, format!("Cannot predict: no trained model for {category}.")))?;
        let value = evaluate_stage(decl, model, project, &ctx)?;
        ctx.insert(category, value)?;
    }
    Ok(ctx.into_map())
}

/// Evaluate one stage against the values produced so far.
///
/// Predictors that are physical attributes come from the project; category
/// predictors must already be in `ctx`. Gated stages with every gate attribute
/// at zero yield zero. Negative model outputs are floored at zero.
pub fn evaluate_stage(
    decl: &StageDecl,
    model: &StageModel,
    project: &NewProject,
    ctx: &PredictionContext,
) -> Result<f64, AppError> {
    let gated_off = !decl.gates.is_empty()
        && decl
            .gates
            .iter()
            .all(|g| project.attributes.get(g).unwrap_or(0.0) == 0.0);
    if gated_off {
        return Ok(0.0);
    }

    let x = model
        .predictors
        .iter()
        .map(|p| {
            if is_attribute(p) {
                Ok(project.attributes.get(p).unwrap_or(0.0))
            } else {
                ctx.get(p)
            }
        })
        .collect::<Result<Vec<f64>, AppError>>()?;

    let value = model.predict(&x, &project.scope)?;
    if value < 0.0 {
        log::debug!("{}: negative prediction {value:.2} floored at zero", decl.category());
    }
    Ok(value.max(0.0))
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::data::MemorySource;
    use crate::domain::ProjectAttributes;
    use crate::fit::{CvPolicy, StageSpec};
    use crate::data::Preparation;
    use crate::pipeline::testing::{COST_COLUMNS, fixture_records, fixture_source};

    fn phase_iii_models() -> &'static PhaseModels {
        static MODELS: OnceLock<PhaseModels> = OnceLock::new();
        MODELS.get_or_init(|| {
            let table = prepare_data(&fixture_source(), &PrepareOptions::default()).unwrap();
            train_models(&table, Phase::III, &TrainOptions::default()).unwrap()
        })
    }

    fn new_project() -> NewProject {
        NewProject {
            attributes: ProjectAttributes {
                longitud_km: 10.0,
                puentes_vehiculares_und: 2.0,
                puentes_vehiculares_mt2: 240.0,
                puentes_peatonales_und: 1.0,
                puentes_peatonales_mt2: 40.0,
                tuneles_und: 0.0,
                tuneles_km: 0.0,
            },
            scope: "Mejoramiento".into(),
        }
    }

    #[test]
    fn phase_iii_trains_every_stage() {
        let models = phase_iii_models();
        assert!(models.is_complete(), "failures: {:?}", models.failures);
        assert_eq!(models.models.len(), models.schema.stages.len());
        let coordination = &models.models["direccion_coordinacion"];
        assert_eq!(coordination.predictors, vec!["trazado_diseno_geometrico", "taludes", "socavacion"]);
    }

    #[test]
    fn phase_iii_prediction_returns_every_category() {
        let models = phase_iii_models();
        let project = new_project();
        let out = predict(models, &project).unwrap();

        let mut expected: Vec<&str> = models.schema.categories();
        expected.sort();
        assert_eq!(out.keys().map(String::as_str).collect::<Vec<_>>(), expected);
        assert_eq!(out["tuneles"], 0.0);
        assert!(out["transporte"] > 0.0);
        assert!(out["estructuras"] > 0.0);

        // The coordination stage is fed the predicted design categories and nothing else.
        let derived = models.models["direccion_coordinacion"]
            .predict(&[out["trazado_diseno_geometrico"], out["taludes"], out["socavacion"]], "")
            .unwrap()
            .max(0.0);
        assert!((out["direccion_coordinacion"] - derived).abs() < 1e-9 * derived.max(1.0));
    }

    #[test]
    fn coordination_ignores_the_scope_label() {
        let coordination = &phase_iii_models().models["direccion_coordinacion"];
        assert!(coordination.feature_names.iter().all(|f| !f.starts_with("scope")));

        let design = [500_000.0, 250_000.0, 150_000.0];
        let base = coordination.predict(&design, "Mejoramiento").unwrap();
        for scope in ["Nuevo", "Rehabilitacion", ""] {
            assert_eq!(coordination.predict(&design, scope).unwrap(), base, "{scope}");
        }

        let mut project = new_project();
        let reference = predict(phase_iii_models(), &project).unwrap();
        project.scope = "Nuevo".into();
        let other = predict(phase_iii_models(), &project).unwrap();
        let from_other = coordination
            .predict(&[other["trazado_diseno_geometrico"], other["taludes"], other["socavacion"]], "Mejoramiento")
            .unwrap()
            .max(0.0);
        assert!((other["direccion_coordinacion"] - from_other).abs() < 1e-9 * from_other.max(1.0));
        assert!(reference["direccion_coordinacion"] > 0.0);
    }

    #[test]
    fn prediction_is_repeatable() {
        let models = phase_iii_models();
        assert_eq!(predict(models, &new_project()).unwrap(), predict(models, &new_project()).unwrap());
    }

    #[test]
    fn dependent_stage_with_empty_context_is_an_ordering_violation() {
        let models = phase_iii_models();
        let decl = models.schema.stage("direccion_coordinacion").unwrap();
        let model = &models.models["direccion_coordinacion"];
        let err = evaluate_stage(decl, model, &new_project(), &PredictionContext::new()).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn gated_stage_predicts_zero_without_the_feature() {
        let models = phase_iii_models();
        let mut project = new_project();
        project.attributes.puentes_vehiculares_und = 0.0;
        project.attributes.puentes_vehiculares_mt2 = 0.0;
        project.attributes.puentes_peatonales_und = 0.0;
        let out = predict(models, &project).unwrap();
        assert_eq!(out["estructuras"], 0.0);
        assert_eq!(out["suelos"], 0.0);
        assert_eq!(out["cantidades"], 0.0);
        assert_eq!(out["urbanismo_paisajismo"], 0.0);
        assert!(out["pavimento"] > 0.0);
    }

    #[test]
    fn failed_stage_blocks_prediction() {
        let mut records = fixture_records();
        for r in &mut records {
            r.costs.insert("tuneles".into(), 0.0);
        }
        let source = MemorySource::new(&COST_COLUMNS, records);
        let table = prepare_data(&source, &PrepareOptions::default()).unwrap();
        let models = train_models(&table, Phase::II, &TrainOptions::default()).unwrap();

        assert_eq!(models.failures.len(), 1);
        assert_eq!(models.failures[0].category, "tuneles");
        assert_eq!(models.failures[0].exit_code, 3);
        let err = predict(&models, &new_project()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.message().contains("tuneles"));
    }

    #[test]
    fn phase_ii_prediction_returns_every_category() {
        let table = prepare_data(&fixture_source(), &PrepareOptions::default()).unwrap();
        let models = train_models(&table, Phase::II, &TrainOptions::default()).unwrap();
        let out = predict(&models, &new_project()).unwrap();
        assert_eq!(out.len(), PhaseSchema::for_phase(Phase::II).stages.len());
        assert!(out.contains_key("costos_presupuestos"));
    }

    #[test]
    fn unsupported_phase_fails_before_training() {
        let err = "I".parse::<Phase>().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn three_row_table_with_outlier_degrades_without_crashing() {
        let mut records = fixture_records();
        records.truncate(3);
        let targets = [100.0, 150.0, 90_000.0];
        for (r, y) in records.iter_mut().zip(targets) {
            r.attributes.tuneles_und = 1.0;
            r.costs.insert("tuneles".into(), y);
        }
        // The injected outlier has no tunnel recorded.
        records[2].attributes.tuneles_und = 0.0;

        let source = MemorySource::new(&COST_COLUMNS, records);
        let table = prepare_data(
            &source,
            &PrepareOptions {
                length_weighting: false,
                ..PrepareOptions::default()
            },
        )
        .unwrap();
        let spec = StageSpec::new("tuneles", &["longitud_km", "tuneles_und"]);
        let frame = table.frame(&["longitud_km", "tuneles_und", "tuneles"], &Preparation::PerUnit).unwrap();
        let model = train_stage(&frame, &spec, &TrainOptions::default()).unwrap();

        assert!(model.outliers.skipped);
        assert_eq!(model.n_samples, 2);
        assert!(model.y_true.iter().all(|y| *y < 1_000.0));
        assert_eq!(model.cv, CvPolicy::None);
        assert!(!model.cross_validated);
        assert!(model.warnings.iter().any(|w| w.contains("cross-validation skipped")));
        assert_eq!(model.metrics.n, 2);
    }

    #[test]
    fn present_value_indexation_scales_costs() {
        let records = fixture_records();
        let base = records[0].cost("transporte");
        let year = records[0].start_year.unwrap();
        let increments = IncrementTable::new([(year + 1, 0.10)].into_iter().collect());
        let table = prepare_data(
            &MemorySource::new(&COST_COLUMNS, records),
            &PrepareOptions {
                present_year: year + 1,
                increments: Some(increments),
                length_weighting: false,
            },
        )
        .unwrap();
        assert!((table.samples[0].cost("transporte") - base * 1.1).abs() < 1e-6);
    }
}
