//! Procesado de acelerómetro e inferencia para modelos ML4F embebidos.
//!
//! Flujo típico:
//!
//! 1. `ModelRunner::set_model` valida el descriptor del modelo.
//! 2. `DataProcessor` acumula muestras en una ventana circular y, cuando la
//!    ventana está completa, aplica el banco de filtros.
//! 3. `ModelRunner::predict` ejecuta el motor sobre el vector de
//!    características y aplica los umbrales de cada acción.
//!
//! Todo es síncrono y de un solo hilo.

mod byte_cursor;
pub mod csv_loader;
pub mod data_processor;
pub mod engine;
pub mod filters;
pub mod model_header;
pub mod model_runner;
pub mod sample_buffer;
pub mod types;

pub use data_processor::{DataProcessor, ProcessorConfig, ProcessorError, ProcessorState};
pub use engine::{EngineModel, InferenceEngine};
pub use filters::{FilterDescriptor, FilterError, FilterKind, DEFAULT_FILTERS};
pub use model_header::{Action, DescriptorBuilder, ModelError, ModelHeader};
pub use model_runner::{calc_prediction, ModelRunner, Prediction, RunnerError};
pub use sample_buffer::SampleBuffer;
pub use types::AccSample;
