//! OFF (Object File Format) support.
//!
//! ASCII only: an `OFF` header line, a `vertices faces edges` count line,
//! vertex coordinates, then faces as `n i0 i1 ...`. Polygons are fan
//! triangulated. `#` starts a comment.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{MorphError, Result};
use crate::mesh::{build_from_triangles, to_face_vertex, HalfEdgeMesh};

/// Load a mesh from an OFF file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<HalfEdgeMesh> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let (vertices, faces) = parse(reader).map_err(|message| MorphError::LoadError {
        path: path.to_path_buf(),
        message,
    })?;
    build_from_triangles(&vertices, &faces)
}

/// Save a mesh to an ASCII OFF file.
pub fn save<P: AsRef<Path>>(mesh: &HalfEdgeMesh, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a mesh as OFF text.
pub fn write<W: Write>(mesh: &HalfEdgeMesh, writer: &mut W) -> Result<()> {
    let (vertices, faces) = to_face_vertex(mesh);
    writeln!(writer, "OFF")?;
    writeln!(writer, "{} {} 0", vertices.len(), faces.len())?;
    for v in &vertices {
        writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
    }
    for f in &faces {
        writeln!(writer, "3 {} {} {}", f[0], f[1], f[2])?;
    }
    Ok(())
}

type FaceVertex = (Vec<Point3<f64>>, Vec<[usize; 3]>);

/// Parse OFF text into vertex positions and triangles.
pub fn parse<R: BufRead>(reader: R) -> std::result::Result<FaceVertex, String> {
    let mut tokens = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| e.to_string())?;
        let content = line.split('#').next().unwrap_or("");
        tokens.extend(content.split_whitespace().map(str::to_owned));
    }

    let mut tokens = tokens.into_iter();
    match tokens.next().as_deref() {
        Some("OFF") => {}
        Some(other) => return Err(format!("expected OFF header, found {other:?}")),
        None => return Err("file is empty".to_string()),
    }

    let num_vertices = parse_count(next_token(&mut tokens, "vertex count")?)?;
    let num_faces = parse_count(next_token(&mut tokens, "face count")?)?;
    let _num_edges = parse_count(next_token(&mut tokens, "edge count")?)?;

    // Each vertex takes three tokens and each face at least one.
    let needed = num_vertices
        .checked_mul(3)
        .and_then(|n| n.checked_add(num_faces))
        .ok_or_else(|| format!("header counts {num_vertices} {num_faces} overflow"))?;
    if needed > tokens.len() {
        return Err(format!(
            "header declares {num_vertices} vertices and {num_faces} faces but only {} values follow",
            tokens.len()
        ));
    }

    let mut vertices = Vec::with_capacity(num_vertices);
    for _ in 0..num_vertices {
        let x = parse_coord(next_token(&mut tokens, "vertex")?)?;
        let y = parse_coord(next_token(&mut tokens, "vertex")?)?;
        let z = parse_coord(next_token(&mut tokens, "vertex")?)?;
        vertices.push(Point3::new(x, y, z));
    }

    let mut faces = Vec::with_capacity(num_faces);
    for _ in 0..num_faces {
        let n = parse_count(next_token(&mut tokens, "face size")?)?;
        if n > tokens.len() {
            return Err(format!("face of size {n} runs past the end of file"));
        }
        let indices = (0..n)
            .map(|_| next_token(&mut tokens, "face index").and_then(parse_count))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for i in 1..n.saturating_sub(1) {
            faces.push([indices[0], indices[i], indices[i + 1]]);
        }
    }

    Ok((vertices, faces))
}

fn next_token<I: Iterator<Item = String>>(tokens: &mut I, what: &str) -> std::result::Result<String, String> {
    tokens.next().ok_or_else(|| format!("unexpected end of file reading {what}"))
}

fn parse_count(s: String) -> std::result::Result<usize, String> {
    s.parse::<usize>().map_err(|e| format!("bad count {s:?}: {e}"))
}

fn parse_coord(s: String) -> std::result::Result<f64, String> {
    s.parse::<f64>().map_err(|e| format!("bad coordinate {s:?}: {e}"))
}
