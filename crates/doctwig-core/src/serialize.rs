//! Tree serialization
//!
//! Depth-first: start tag, children, end tag. Tags lexed from the input are
//! written from the source buffer unchanged, so a tree that was never
//! repaired reproduces its input exactly.

use std::io::{self, Write};

use encoding_rs::Encoding;

use crate::tree::{NodeId, Tree};

/// Visit the text pieces of `tree` in document order
pub fn for_each_piece<F>(tree: &Tree, mut f: F) -> io::Result<()>
where
    F: FnMut(&str) -> io::Result<()>,
{
    visit(tree, tree.root(), &mut f)
}

fn visit<F>(tree: &Tree, id: NodeId, f: &mut F) -> io::Result<()>
where
    F: FnMut(&str) -> io::Result<()>,
{
    let element = tree.get(id);
    if let Some(start) = &element.start {
        f(start.as_str(tree.source()))?;
    }
    for &child in element.children() {
        visit(tree, child, f)?;
    }
    if let Some(end) = &element.end {
        f(end.as_str(tree.source()))?;
    }
    Ok(())
}

/// Render the tree as a string
pub fn to_xml_string(tree: &Tree) -> String {
    let mut out = String::with_capacity(tree.source().len());
    // Appending to a String cannot fail
    let _ = for_each_piece(tree, |piece| {
        out.push_str(piece);
        Ok(())
    });
    out
}

/// Write the tree encoded as `encoding`
///
/// Encodings that cannot be written (UTF-16) fall back to UTF-8.
pub fn write_tree<W: Write>(
    tree: &Tree,
    encoding: &'static Encoding,
    mut out: W,
) -> io::Result<()> {
    let encoding = encoding.output_encoding();
    if encoding == encoding_rs::UTF_8 {
        for_each_piece(tree, |piece| out.write_all(piece.as_bytes()))?;
    } else {
        let text = to_xml_string(tree);
        let (bytes, _, unmappable) = encoding.encode(&text);
        if unmappable {
            tracing::warn!(
                charset = encoding.name(),
                "characters not representable in output charset were replaced"
            );
        }
        out.write_all(&bytes)?;
    }
    out.flush()
}
