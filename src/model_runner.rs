use std::collections::TryReserveError;
use std::ptr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::data_processor::ProcessorConfig;
use crate::engine::{argmax, InferenceEngine};
use crate::model_header::{Action, ModelError, ModelHeader};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunnerError {
    #[error("No model registered")]
    NoModel,

    #[error("Invalid model descriptor: {0}")]
    Descriptor(#[from] ModelError),

    #[error("Invalid input size: expected {expected}, got {actual}")]
    InputSize { expected: usize, actual: usize },

    #[error("Model has {outputs} outputs but {actions} actions")]
    ActionMismatch { outputs: usize, actions: usize },

    #[error("Inference engine failed with status {0}")]
    Engine(i32),

    #[error("Could not allocate {len} scores: {source}")]
    Alloc {
        len: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Resultado de una inferencia
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction<'m> {
    /// Salida cruda del modelo, una puntuación por acción
    pub scores: Vec<f32>,
    /// Acción ganadora tras aplicar los umbrales
    pub index: Option<usize>,
    pub action: Option<Action<'m>>,
}

/// Aplica los umbrales de cada acción y devuelve la ganadora.
///
/// Una puntuación por debajo de su umbral cuenta como 0. Si ninguna lo supera
/// (máximo exactamente 0) no hay predicción. Con longitudes distintas o vacías
/// tampoco.
pub fn calc_prediction(actions: &[Action<'_>], scores: &[f32]) -> Option<usize> {
    if scores.is_empty() || scores.len() != actions.len() {
        return None;
    }

    let above_threshold: Vec<f32> = scores
        .iter()
        .zip(actions)
        .map(|(&score, action)| if score >= action.threshold { score } else { 0.0 })
        .collect();

    let index = argmax(&above_threshold)?;
    if above_threshold[index] == 0.0 {
        None
    } else {
        Some(index)
    }
}

/// Ejecuta un modelo descrito por un descriptor prestado.
///
/// El descriptor vive fuera del runner y puede cambiar entre llamadas, así
/// que la cabecera y las etiquetas se vuelven a validar en cada acceso. La
/// tabla de acciones se cachea y solo se reconstruye si cambian el número de
/// acciones, la posición de sus etiquetas o sus umbrales.
pub struct ModelRunner<'m, E> {
    engine: E,
    model: Option<&'m [u8]>,
    actions: Vec<Action<'m>>,
}

impl<'m, E: InferenceEngine> ModelRunner<'m, E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            model: None,
            actions: Vec::new(),
        }
    }

    /// Registra un descriptor. Si no es válido el runner se queda sin modelo.
    pub fn set_model(&mut self, model: &'m [u8]) -> Result<ModelHeader<'m>, RunnerError> {
        self.clear_model();

        let header = ModelHeader::parse(model).map_err(|err| {
            warn!(error = %err, "rejected model descriptor");
            err
        })?;
        self.model = Some(model);
        self.refresh_actions(&header)?;

        debug!(
            samples_period = header.samples_period(),
            samples_length = header.samples_length(),
            dimensions = header.sample_dimensions(),
            actions = header.number_of_actions(),
            "model registered"
        );
        Ok(header)
    }

    pub fn clear_model(&mut self) {
        self.model = None;
        self.actions.clear();
    }

    pub fn is_model_present(&self) -> bool {
        self.model.is_some()
    }

    /// Cabecera del modelo registrado, validada de nuevo
    pub fn model_header(&mut self) -> Result<ModelHeader<'m>, RunnerError> {
        let model = self.model.ok_or(RunnerError::NoModel)?;
        ModelHeader::parse(model).map_err(|err| {
            warn!(error = %err, "registered model is no longer valid");
            self.clear_model();
            RunnerError::from(err)
        })
    }

    fn peek_header(&self) -> Option<ModelHeader<'m>> {
        self.model.and_then(|model| ModelHeader::parse(model).ok())
    }

    pub fn samples_period(&self) -> Option<u16> {
        self.peek_header().map(|header| header.samples_period())
    }

    pub fn samples_length(&self) -> Option<u16> {
        self.peek_header().map(|header| header.samples_length())
    }

    pub fn sample_dimensions(&self) -> Option<u8> {
        self.peek_header().map(|header| header.sample_dimensions())
    }

    /// Tamaño del vector de características que espera el modelo
    pub fn input_length(&self) -> Option<usize> {
        self.peek_header()
            .map(|header| header.engine_model().input_len())
    }

    pub fn output_length(&self) -> Option<usize> {
        self.peek_header()
            .map(|header| header.engine_model().output_len())
    }

    /// Configuración del procesador de datos para el modelo registrado
    pub fn processor_config(&mut self) -> Result<ProcessorConfig, RunnerError> {
        let header = self.model_header()?;
        Ok(ProcessorConfig::for_model(&header, &header.engine_model()))
    }

    /// Tabla de acciones del modelo registrado
    pub fn actions(&mut self) -> Result<&[Action<'m>], RunnerError> {
        let header = self.model_header()?;
        self.refresh_actions(&header)?;
        Ok(&self.actions)
    }

    fn refresh_actions(&mut self, header: &ModelHeader<'m>) -> Result<(), RunnerError> {
        // Cada acceso vuelve a validar todas las etiquetas, el descriptor
        // puede haber cambiado. La caché solo evita reconstruir la tabla.
        let count = header.number_of_actions() as usize;
        let unchanged = count == self.actions.len()
            && header
                .actions()
                .zip(&self.actions)
                .all(|(action, cached)| match action {
                    Ok(action) => {
                        ptr::eq(action.label, cached.label)
                            && action.threshold.to_bits() == cached.threshold.to_bits()
                    }
                    Err(_) => false,
                });
        if unchanged {
            return Ok(());
        }

        match header.actions().collect::<Result<Vec<_>, _>>() {
            Ok(actions) => {
                debug!(count, "action table rebuilt");
                self.actions = actions;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "corrupt action table");
                self.clear_model();
                Err(err.into())
            }
        }
    }

    /// Ejecuta el modelo y devuelve la salida cruda
    pub fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, RunnerError> {
        let header = self.model_header()?;
        self.invoke(&header, input)
    }

    fn invoke(&mut self, header: &ModelHeader<'m>, input: &[f32]) -> Result<Vec<f32>, RunnerError> {
        let engine_model = header.engine_model();

        let expected = engine_model.input_len();
        if input.len() != expected {
            return Err(RunnerError::InputSize {
                expected,
                actual: input.len(),
            });
        }

        let len = engine_model.output_len();
        let mut scores = Vec::new();
        scores
            .try_reserve_exact(len)
            .map_err(|source| RunnerError::Alloc { len, source })?;
        scores.resize(len, 0.0);
        let status = self.engine.invoke(&engine_model, input, &mut scores);
        if status != 0 {
            warn!(status, "inference failed");
            return Err(RunnerError::Engine(status));
        }

        Ok(scores)
    }

    /// Ejecuta el modelo sobre un vector de características y aplica los
    /// umbrales de las acciones.
    pub fn predict(&mut self, features: &[f32]) -> Result<Prediction<'m>, RunnerError> {
        let header = self.model_header()?;
        self.refresh_actions(&header)?;

        let outputs = header.engine_model().output_len();
        if outputs != self.actions.len() {
            return Err(RunnerError::ActionMismatch {
                outputs,
                actions: self.actions.len(),
            });
        }

        let scores = self.invoke(&header, features)?;
        let index = calc_prediction(&self.actions, &scores);
        let action = index.map(|i| self.actions[i]);

        Ok(Prediction {
            scores,
            index,
            action,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
