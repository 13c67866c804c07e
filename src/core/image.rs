use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Complex-valued 2-D array, row-major, one entry per pixel
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<Complex<f64>>,
}

impl ComplexImage {
    pub fn new(width: usize, height: usize, data: Vec<Complex<f64>>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self { width, height, data }
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![Complex::new(0.0, 0.0); width * height],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn at(&self, x: usize, y: usize) -> Complex<f64> {
        self.data[y * self.width + x]
    }

    pub fn amplitude(&self) -> Vec<f64> {
        self.data.iter().map(|v| v.norm()).collect()
    }

    /// Phase per pixel in radians, in (-π, π]
    pub fn phase(&self) -> Vec<f64> {
        self.data.iter().map(|v| phase_of(*v)).collect()
    }
}

/// `atan2` folds onto [-π, π]; -π is reported as π.
pub fn phase_of(value: Complex<f64>) -> f64 {
    let angle = value.arg();
    if angle <= -PI {
        PI
    } else {
        angle
    }
}
