//! # Frame Graph
//!
//! The frame is an explicit ordered list of pass descriptors. Each
//! descriptor names the attachments it reads and writes; [`FrameGraph::build`]
//! checks the order before the pipeline is ever run.
//!
//! ## Rules
//!
//! - Every required input is written by an earlier pass.
//! - An optional input may be absent, but if some pass writes it, that pass
//!   must come earlier.
//! - Every attachment has exactly one producer.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Named attachment flowing between passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// Scene depth from the pre-pass
    Depth,
    /// View-space normals from the pre-pass
    Normal,
    /// Single-channel ambient occlusion
    Ssao,
    /// Screen-space motion vectors
    Velocity,
    /// Resolved HDR colour from the forward pass
    Hdr,
    /// Bloom mip 0 after accumulation
    Bloom,
    /// Final graded image
    Output,
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Passes the frame pipeline knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Depth and normal pre-pass
    PrePass,
    /// Screen-space ambient occlusion
    Ssao,
    /// Motion vectors
    Velocity,
    /// Lit forward pass with selection outline
    Forward,
    /// Post-processing chain
    PostProcessing,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a pass consumes and produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDescriptor {
    /// Which pass
    pub kind: PassKind,
    /// Inputs that must be produced earlier
    pub reads: Vec<Attachment>,
    /// Inputs used when present
    pub optional_reads: Vec<Attachment>,
    /// Outputs
    pub writes: Vec<Attachment>,
}

impl PassDescriptor {
    /// Descriptor with no inputs or outputs
    pub const fn new(kind: PassKind) -> Self {
        Self {
            kind,
            reads: Vec::new(),
            optional_reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Builder pattern: add required inputs
    pub fn reads(mut self, attachments: &[Attachment]) -> Self {
        self.reads.extend_from_slice(attachments);
        self
    }

    /// Builder pattern: add optional inputs
    pub fn optionally_reads(mut self, attachments: &[Attachment]) -> Self {
        self.optional_reads.extend_from_slice(attachments);
        self
    }

    /// Builder pattern: add outputs
    pub fn writes(mut self, attachments: &[Attachment]) -> Self {
        self.writes.extend_from_slice(attachments);
        self
    }
}

/// Pass ordering errors found at build time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// No pass writes a required input
    #[error("{pass} reads {input}, which no pass produces")]
    UnsatisfiedInput {
        /// Consumer
        pass: PassKind,
        /// Missing attachment
        input: Attachment,
    },
    /// The producer runs after the consumer
    #[error("{pass} reads {input} before {producer} produces it")]
    InputProducedLater {
        /// Consumer
        pass: PassKind,
        /// Attachment read too early
        input: Attachment,
        /// Later producer
        producer: PassKind,
    },
    /// Two passes write the same attachment
    #[error("{output} is produced by both {first} and {second}")]
    DuplicateOutput {
        /// Attachment
        output: Attachment,
        /// First producer
        first: PassKind,
        /// Second producer
        second: PassKind,
    },
}

/// Validated pass order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGraph {
    passes: Vec<PassDescriptor>,
}

impl FrameGraph {
    /// Validate `passes` in the given order
    pub fn build(passes: Vec<PassDescriptor>) -> Result<Self, PipelineError> {
        let mut producers: HashMap<Attachment, (usize, PassKind)> = HashMap::new();
        for (index, pass) in passes.iter().enumerate() {
            for output in &pass.writes {
                if let Some((_, first)) = producers.get(output) {
                    return Err(PipelineError::DuplicateOutput {
                        output: *output,
                        first: *first,
                        second: pass.kind,
                    });
                }
                producers.insert(*output, (index, pass.kind));
            }
        }

        for (index, pass) in passes.iter().enumerate() {
            for input in &pass.reads {
                match producers.get(input) {
                    None => {
                        return Err(PipelineError::UnsatisfiedInput {
                            pass: pass.kind,
                            input: *input,
                        })
                    }
                    Some((at, producer)) if *at >= index => {
                        return Err(PipelineError::InputProducedLater {
                            pass: pass.kind,
                            input: *input,
                            producer: *producer,
                        })
                    }
                    Some(_) => {}
                }
            }
            for input in &pass.optional_reads {
                if let Some((at, producer)) = producers.get(input) {
                    if *at >= index {
                        return Err(PipelineError::InputProducedLater {
                            pass: pass.kind,
                            input: *input,
                            producer: *producer,
                        });
                    }
                }
            }
        }

        Ok(Self { passes })
    }

    /// Passes in execution order
    pub fn order(&self) -> impl Iterator<Item = PassKind> + '_ {
        self.passes.iter().map(|p| p.kind)
    }

    /// Descriptors in execution order
    pub fn passes(&self) -> &[PassDescriptor] {
        &self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pre() -> PassDescriptor {
        PassDescriptor::new(PassKind::PrePass).writes(&[Attachment::Depth, Attachment::Normal])
    }

    fn ssao() -> PassDescriptor {
        PassDescriptor::new(PassKind::Ssao)
            .reads(&[Attachment::Depth, Attachment::Normal])
            .writes(&[Attachment::Ssao])
    }

    fn forward() -> PassDescriptor {
        PassDescriptor::new(PassKind::Forward)
            .optionally_reads(&[Attachment::Ssao])
            .writes(&[Attachment::Hdr])
    }

    #[test]
    fn test_valid_order() {
        let graph = FrameGraph::build(vec![pre(), ssao(), forward()]).unwrap();
        let order: Vec<_> = graph.order().collect();
        assert_eq!(order, vec![PassKind::PrePass, PassKind::Ssao, PassKind::Forward]);
    }

    #[test]
    fn test_optional_input_may_be_missing() {
        assert!(FrameGraph::build(vec![pre(), forward()]).is_ok());
    }

    #[test]
    fn test_optional_input_produced_later() {
        let err = FrameGraph::build(vec![pre(), forward(), ssao()]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InputProducedLater {
                pass: PassKind::Forward,
                input: Attachment::Ssao,
                producer: PassKind::Ssao,
            }
        );
    }

    #[test]
    fn test_required_input_out_of_order() {
        let err = FrameGraph::build(vec![ssao(), pre()]).unwrap_err();
        assert!(matches!(err, PipelineError::InputProducedLater { pass: PassKind::Ssao, .. }));
    }

    #[test]
    fn test_unsatisfied_input() {
        let err = FrameGraph::build(vec![ssao()]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::UnsatisfiedInput {
                pass: PassKind::Ssao,
                input: Attachment::Depth,
            }
        );
    }

    #[test]
    fn test_duplicate_output() {
        let twice = PassDescriptor::new(PassKind::Velocity).writes(&[Attachment::Depth]);
        let err = FrameGraph::build(vec![pre(), twice]).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateOutput { output: Attachment::Depth, .. }));
        assert!(err.to_string().contains("Depth"));
    }
}
