// Conversion between typed device frames and the interleaved byte view the core uses

/// A PCM sample type the device can deliver
pub trait Sample: Copy + Default + Send + 'static {
    const BYTES: usize;

    fn write_ne(self, out: &mut [u8]);

    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! impl_sample {
    ($ty:ty, $bytes:expr) => {
        impl Sample for $ty {
            const BYTES: usize = $bytes;

            fn write_ne(self, out: &mut [u8]) {
                out[..$bytes].copy_from_slice(&self.to_ne_bytes());
            }

            fn read_ne(bytes: &[u8]) -> Self {
                let mut raw = [0u8; $bytes];
                raw.copy_from_slice(&bytes[..$bytes]);
                <$ty>::from_ne_bytes(raw)
            }
        }
    };
}

impl_sample!(i16, 2);
impl_sample!(i32, 4);
impl_sample!(f32, 4);

/// A frame (one sample per channel) that can be flattened to bytes
pub trait FrameBytes: Copy + Default {
    const BYTES: usize;

    /// Append interleaved bytes for `frames` to `out`
    fn encode(frames: &[Self], out: &mut Vec<u8>);

    /// Fill `frames` from interleaved bytes; frames past the end of `bytes`
    /// become silence
    fn decode(bytes: &[u8], frames: &mut [Self]);
}

impl<T: Sample> FrameBytes for T {
    const BYTES: usize = T::BYTES;

    fn encode(frames: &[Self], out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + frames.len() * T::BYTES, 0);
        for (frame, chunk) in frames.iter().zip(out[start..].chunks_exact_mut(T::BYTES)) {
            frame.write_ne(chunk);
        }
    }

    fn decode(bytes: &[u8], frames: &mut [Self]) {
        let mut chunks = bytes.chunks_exact(T::BYTES);
        for frame in frames.iter_mut() {
            *frame = chunks.next().map(T::read_ne).unwrap_or_default();
        }
    }
}

impl<T: Sample> FrameBytes for (T, T) {
    const BYTES: usize = T::BYTES * 2;

    fn encode(frames: &[Self], out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + frames.len() * Self::BYTES, 0);
        for (frame, chunk) in frames.iter().zip(out[start..].chunks_exact_mut(Self::BYTES)) {
            frame.0.write_ne(&mut chunk[..T::BYTES]);
            frame.1.write_ne(&mut chunk[T::BYTES..]);
        }
    }

    fn decode(bytes: &[u8], frames: &mut [Self]) {
        let mut chunks = bytes.chunks_exact(Self::BYTES);
        for frame in frames.iter_mut() {
            *frame = match chunks.next() {
                Some(chunk) => (T::read_ne(&chunk[..T::BYTES]), T::read_ne(&chunk[T::BYTES..])),
                None => Default::default(),
            };
        }
    }
}
