/// Resolves a node's source offset to a line number for error reporting.
///
/// The parser owns the position tables, so the compiler only ever sees this capability.
pub trait LineLookup: Sync {
    fn line_of(&self, offset: usize) -> usize;
}

impl<F> LineLookup for F
where
    F: Fn(usize) -> usize + Sync,
{
    fn line_of(&self, offset: usize) -> usize {
        self(offset)
    }
}

/// Line lookup built straight from the template source.
/// Offsets are byte offsets, lines are 1-based.
#[derive(Debug, Clone)]
pub struct SourceLines {
    line_starts: Vec<usize>,
}

impl SourceLines {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(index, _)| index + 1),
        );

        SourceLines { line_starts }
    }
}

impl LineLookup for SourceLines {
    fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|start| *start <= offset)
    }
}
