use crate::data_processor::ProcessorError;

/// Buffer circular con un anillo por dimensión.
///
/// Todas las dimensiones avanzan con el mismo cursor. Tras la primera vuelta
/// el buffer queda lleno para siempre y cada nueva muestra sobrescribe la más
/// antigua.
pub struct SampleBuffer {
    samples: Vec<Vec<f32>>,
    scratch: Vec<f32>,
    samples_length: usize,
    index: usize,
    filled: bool,
}

/// Reserva un vector de `len` ceros sin abortar si no hay memoria
pub(crate) fn try_zeroed(len: usize, what: &'static str) -> Result<Vec<f32>, ProcessorError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|source| ProcessorError::Alloc { what, source })?;
    data.resize(len, 0.0);
    Ok(data)
}

impl SampleBuffer {
    /// Crea un buffer de `dimensions` anillos de `samples_length` muestras
    pub fn new(dimensions: usize, samples_length: usize) -> Result<Self, ProcessorError> {
        if dimensions == 0 || samples_length == 0 {
            return Err(ProcessorError::Config(format!(
                "dimensions ({}) and samples length ({}) must be non-zero",
                dimensions, samples_length
            )));
        }

        let mut samples = Vec::new();
        samples
            .try_reserve_exact(dimensions)
            .map_err(|source| ProcessorError::Alloc {
                what: "sample rings",
                source,
            })?;
        for _ in 0..dimensions {
            samples.push(try_zeroed(samples_length, "sample ring")?);
        }

        Ok(Self {
            samples,
            scratch: try_zeroed(samples_length, "scratch buffer")?,
            samples_length,
            index: 0,
            filled: false,
        })
    }

    /// Añade un lote de muestras intercaladas: [d0, d1, .., d0, d1, ..]
    /// El número de elementos debe ser múltiplo del número de dimensiones.
    pub fn record(&mut self, samples: &[f32]) -> Result<(), ProcessorError> {
        let dimensions = self.dimensions();
        if samples.len() % dimensions != 0 {
            return Err(ProcessorError::Config(format!(
                "{} elements is not a multiple of {} dimensions",
                samples.len(),
                dimensions
            )));
        }

        for sample in samples.chunks_exact(dimensions) {
            for (ring, &value) in self.samples.iter_mut().zip(sample) {
                ring[self.index] = value;
            }
            self.index += 1;
            if self.index >= self.samples_length {
                self.index = 0;
                self.filled = true;
            }
        }

        Ok(())
    }

    /// Verifica si se completó al menos una ventana
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// Devuelve la ventana de una dimensión en orden cronológico.
    ///
    /// Se rota el anillo sobre un único buffer temporal que se reutiliza, así
    /// que la vista solo es válida hasta la siguiente llamada.
    pub fn snapshot(&mut self, dimension: usize) -> Option<&[f32]> {
        let ring = self.samples.get(dimension)?;
        let elements_left = self.samples_length - self.index;

        self.scratch[..elements_left].copy_from_slice(&ring[self.index..]);
        self.scratch[elements_left..].copy_from_slice(&ring[..self.index]);

        Some(&self.scratch)
    }

    pub fn dimensions(&self) -> usize {
        self.samples.len()
    }

    pub fn samples_length(&self) -> usize {
        self.samples_length
    }

    /// Posición donde se escribirá la siguiente muestra
    pub fn index(&self) -> usize {
        self.index
    }

    /// Vacía el buffer y vuelve al estado inicial
    pub fn clear(&mut self) {
        for ring in &mut self.samples {
            ring.fill(0.0);
        }
        self.index = 0;
        self.filled = false;
    }
}
