use anyhow::Result;

/// One source callback's worth of PCM samples.
///
/// Samples are interleaved when `channels > 1`; the relay itself only ever
/// queues mono frames.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    data: Vec<f32>,
    channels: u16,
}

impl SampleFrame {
    /// Create a frame from raw samples.
    ///
    /// Returns an error if the channel count is zero or the data length is
    /// not a multiple of it.
    pub fn new(data: Vec<f32>, channels: u16) -> Result<Self> {
        if channels == 0 {
            anyhow::bail!("Frame channel count must be at least 1");
        }
        if data.len() % channels as usize != 0 {
            anyhow::bail!(
                "Data length {} must be a multiple of channels {}",
                data.len(),
                channels
            );
        }
        Ok(Self { data, channels })
    }

    /// A mono frame. Always valid.
    pub fn mono(data: Vec<f32>) -> Self {
        Self { data, channels: 1 }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the number of samples per channel.
    pub fn samples_per_channel(&self) -> usize {
        self.data.len() / self.channels as usize
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = SampleFrame::new(vec![0.1, -0.1, 0.2, -0.2], 2).unwrap();
        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.samples_per_channel(), 2);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_frame_validation() {
        assert!(SampleFrame::new(vec![0.0; 961], 2).is_err());
        assert!(SampleFrame::new(vec![0.0; 4], 0).is_err());
        assert!(SampleFrame::new(Vec::new(), 1).unwrap().is_empty());
    }
}
