//! Advisory report for degraded-capability runs.

use std::fmt;

use crate::primitive::UvRemap;

/// One advisory produced during an optimize or write pass.
#[derive(Debug, Clone)]
pub enum ReportEntry {
    /// Buffer compression failed or was inapplicable; the view was emitted
    /// uncompressed.
    CompressionSkipped {
        mesh: usize,
        primitive: usize,
        reason: String,
    },
    /// Simplification degraded to the identity transform.
    SimplifierDegraded {
        mesh: usize,
        primitive: usize,
        reason: String,
    },
    /// An image could not be decoded; its bytes were left untouched and it
    /// contributed nothing to importance analysis.
    ImageDecodeFailed { image: usize, reason: String },
    /// UVs fell outside `[0, 1]` and were remapped before quantization; the
    /// writer does not compensate materials.
    UvRemapped {
        mesh: usize,
        primitive: usize,
        remap: UvRemap,
    },
    /// A mesh with a position affine is referenced by nodes with differing
    /// rotations; the folded translation is only exact for the first node.
    SharedMeshRotation { mesh: usize, node: usize },
    /// Primitive mode is not TRIANGLES; simplification and index compression
    /// were skipped for it.
    NonTrianglePrimitive {
        mesh: usize,
        primitive: usize,
        mode: u32,
    },
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportEntry::CompressionSkipped {
                mesh,
                primitive,
                reason,
            } => write!(
                f,
                "mesh {mesh} primitive {primitive}: compression skipped ({reason})"
            ),
            ReportEntry::SimplifierDegraded {
                mesh,
                primitive,
                reason,
            } => write!(
                f,
                "mesh {mesh} primitive {primitive}: simplifier degraded to identity ({reason})"
            ),
            ReportEntry::ImageDecodeFailed { image, reason } => {
                write!(f, "image {image}: decode failed ({reason})")
            }
            ReportEntry::UvRemapped {
                mesh, primitive, ..
            } => write!(
                f,
                "mesh {mesh} primitive {primitive}: out-of-range UVs remapped; materials not rewritten"
            ),
            ReportEntry::SharedMeshRotation { mesh, node } => write!(
                f,
                "mesh {mesh}: shared by node {node} with a different rotation; \
                 de-quantization translation is approximate for it"
            ),
            ReportEntry::NonTrianglePrimitive {
                mesh,
                primitive,
                mode,
            } => write!(
                f,
                "mesh {mesh} primitive {primitive}: mode {mode} is not TRIANGLES; \
                 simplification and index compression skipped"
            ),
        }
    }
}

/// Collected advisories plus input/output counters.
#[derive(Debug, Clone, Default)]
pub struct OptimizeReport {
    pub entries: Vec<ReportEntry>,
    pub input_triangles: usize,
    pub input_vertices: usize,
    pub output_triangles: usize,
    pub output_vertices: usize,
}

impl OptimizeReport {
    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    /// True when every capability ran at full fidelity.
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded UV remaps, for callers that want to compensate materials.
    pub fn uv_remaps(&self) -> impl Iterator<Item = (usize, usize, UvRemap)> + '_ {
        self.entries.iter().filter_map(|e| match e {
            ReportEntry::UvRemapped {
                mesh,
                primitive,
                remap,
            } => Some((*mesh, *primitive, *remap)),
            _ => None,
        })
    }

    /// Human-readable one-line-per-entry summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} -> {} triangles, {} -> {} vertices",
            self.input_triangles, self.output_triangles, self.input_vertices, self.output_vertices
        );
        for e in &self.entries {
            out.push('\n');
            out.push_str(&e.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_report() {
        let report = OptimizeReport::default();
        assert!(report.is_clean());
        assert_eq!(report.uv_remaps().count(), 0);
    }

    #[test]
    fn test_summary_lists_entries() {
        let mut report = OptimizeReport {
            input_triangles: 100,
            output_triangles: 50,
            ..Default::default()
        };
        report.push(ReportEntry::CompressionSkipped {
            mesh: 0,
            primitive: 1,
            reason: "encoder unavailable".to_string(),
        });
        let text = report.summary();
        assert!(text.contains("100 -> 50"));
        assert!(text.contains("compression skipped"));
        assert!(!report.is_clean());
    }
}
