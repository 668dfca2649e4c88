//! uint8 quantization of embedding vectors for compact storage.

use ndarray::Array1;

/// An embedding packed into one byte per dimension.
///
/// `original ≈ bytes * scale + offset`
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedEmbedding {
    pub bytes: Vec<u8>,
    pub scale: f32,
    pub offset: f32,
}

impl QuantizedEmbedding {
    /// Map `[min, max]` of the vector linearly onto `[0, 255]`.
    pub fn quantize(embedding: &Array1<f32>) -> Self {
        let min_val = embedding.iter().copied().fold(f32::INFINITY, f32::min);
        let max_val = embedding.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let range = max_val - min_val;
        if !range.is_finite() || range < 1e-9 {
            let offset = if min_val.is_finite() { min_val } else { 0.0 };
            return Self {
                bytes: vec![0u8; embedding.len()],
                scale: 0.0,
                offset,
            };
        }

        let scale = range / 255.0;
        let bytes = embedding
            .iter()
            .map(|&v| ((v - min_val) / scale).round().clamp(0.0, 255.0) as u8)
            .collect();

        Self {
            bytes,
            scale,
            offset: min_val,
        }
    }

    pub fn dequantize(&self) -> Array1<f32> {
        Array1::from_iter(self.bytes.iter().map(|&b| b as f32 * self.scale + self.offset))
    }

    pub fn dimension(&self) -> usize {
        self.bytes.len()
    }
}

/// L2-normalize a vector; `None` for a (near-)zero vector.
pub fn normalize(v: &Array1<f32>) -> Option<Array1<f32>> {
    let norm = v.dot(v).sqrt();
    if norm < 1e-9 {
        None
    } else {
        Some(v / norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_quantize_preserves_values() {
        let original = array![0.12, -0.4, 0.33, 0.9, -0.05];
        let restored = QuantizedEmbedding::quantize(&original).dequantize();

        for (a, b) in original.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 0.01, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_constant_vector() {
        let q = QuantizedEmbedding::quantize(&array![0.25, 0.25, 0.25]);
        assert_eq!(q.scale, 0.0);
        assert_eq!(q.offset, 0.25);
        assert_eq!(q.dimension(), 3);
        assert_eq!(q.dequantize(), array![0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert!(normalize(&array![0.0, 0.0]).is_none());
        let n = normalize(&array![3.0, 4.0]).unwrap();
        assert!((n[0] - 0.6).abs() < 1e-6);
    }
}
