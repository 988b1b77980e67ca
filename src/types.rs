/// Dimensiones del acelerómetro: x, y, z
pub const ACC_DIMENSIONS: usize = 3;

/// Factor de conversión de las lecturas crudas (mili-g) a g
pub const MILLI_G_PER_G: f32 = 1000.0;

/// Longitud de ventana por defecto (muestras por dimensión)
pub const DEFAULT_SAMPLES_LENGTH: usize = 80;

/// Una muestra del acelerómetro ya convertida a g
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Crea una muestra desde las lecturas enteras del sensor (mili-g)
    pub fn from_milli_g(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: x as f32 / MILLI_G_PER_G,
            y: y as f32 / MILLI_G_PER_G,
            z: z as f32 / MILLI_G_PER_G,
        }
    }

    /// Orden de dimensiones con el que se entrenó el modelo: [x, y, z]
    pub fn to_array(&self) -> [f32; ACC_DIMENSIONS] {
        [self.x, self.y, self.z]
    }
}
