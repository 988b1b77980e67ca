use mlrunner::SampleBuffer;
use proptest::prelude::*;

proptest! {
    /// La ventana siempre contiene las últimas `len` muestras en orden,
    /// con ceros delante mientras no se haya llenado.
    #[test]
    fn snapshot_is_latest_window_in_order(
        len in 1usize..16,
        values in prop::collection::vec(-100.0f32..100.0, 0..64),
    ) {
        let mut buffer = SampleBuffer::new(1, len).unwrap();
        for value in &values {
            buffer.record(&[*value]).unwrap();
        }

        let mut padded = vec![0.0f32; len];
        padded.extend_from_slice(&values);
        let expected = &padded[padded.len() - len..];

        prop_assert_eq!(buffer.is_filled(), values.len() >= len);
        prop_assert_eq!(buffer.snapshot(0).unwrap(), expected);
    }

    /// Grabar por lotes equivale a grabar muestra a muestra
    #[test]
    fn batch_record_matches_single_records(
        len in 1usize..12,
        samples in prop::collection::vec((-10.0f32..10.0, -10.0f32..10.0), 0..40),
    ) {
        let flat: Vec<f32> = samples.iter().flat_map(|&(a, b)| [a, b]).collect();

        let mut batched = SampleBuffer::new(2, len).unwrap();
        batched.record(&flat).unwrap();

        let mut single = SampleBuffer::new(2, len).unwrap();
        for &(a, b) in &samples {
            single.record(&[a, b]).unwrap();
        }

        prop_assert_eq!(batched.index(), single.index());
        prop_assert_eq!(batched.is_filled(), single.is_filled());
        for dimension in 0..2 {
            let expected = single.snapshot(dimension).unwrap().to_vec();
            prop_assert_eq!(batched.snapshot(dimension).unwrap(), expected.as_slice());
        }
    }
}
