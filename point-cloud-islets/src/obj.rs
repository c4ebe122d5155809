/// Wavefront OBJ export and re-import
use crate::error::{IsletError, Result};
use crate::math::Point3;
use crate::mesh::Mesh;
use constants::raster::OBJ_DECIMALS;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Write `v x y z r g b` lines (colours omitted when the mesh has none)
/// followed by 1-based `f a b c` lines.
pub fn write_obj<W: Write>(mesh: &Mesh, out: &mut W) -> std::io::Result<()> {
    let p = OBJ_DECIMALS;
    for (k, v) in mesh.vertices.iter().enumerate() {
        write!(out, "v {:.p$} {:.p$} {:.p$}", v.x, v.y, v.z)?;
        if mesh.has_colours() {
            let [r, g, b] = mesh.colours[k];
            write!(out, " {:.p$} {:.p$} {:.p$}", r, g, b)?;
        }
        writeln!(out)?;
    }
    for t in &mesh.triangles {
        writeln!(out, "f {} {} {}", t[0] + 1, t[1] + 1, t[2] + 1)?;
    }
    Ok(())
}

/// Write a mesh to `path`.
pub fn save_obj(mesh: &Mesh, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| IsletError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| IsletError::io(path, e))
}

/// Read an OBJ file back into a single mesh.
///
/// Vertices keep their file order, including vertices no face uses.
/// Polygons are fanned into triangles; texture and normal references in
/// `f` records are ignored, as are all other record types.
pub fn read_obj(path: &Path) -> Result<Mesh> {
    let file = File::open(path).map_err(|e| IsletError::io(path, e))?;
    parse_obj(BufReader::new(file), path)
}

fn parse_obj<R: BufRead>(reader: R, path: &Path) -> Result<Mesh> {
    let malformed = |line_num: usize, reason: &str| IsletError::MalformedObj {
        path: path.to_path_buf(),
        reason: format!("line {}: {}", line_num + 1, reason),
    };

    let mut mesh = Mesh::new();
    let mut coloured_vertices = 0;
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| IsletError::io(path, e))?;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let values: Vec<f64> = parts
                    .map(str::parse::<f64>)
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| malformed(line_num, "invalid vertex coordinate"))?;
                match values.as_slice() {
                    [x, y, z, r, g, b, ..] => {
                        mesh.vertices.push(Point3::new(*x, *y, *z));
                        mesh.colours.push([*r, *g, *b]);
                        coloured_vertices += 1;
                    }
                    [x, y, z, ..] => {
                        mesh.vertices.push(Point3::new(*x, *y, *z));
                        mesh.colours.push([1.0, 1.0, 1.0]);
                    }
                    _ => return Err(malformed(line_num, "vertex needs three coordinates")),
                }
            }
            Some("f") => {
                let corners = parts
                    .map(|token| face_index(token, mesh.vertices.len()))
                    .collect::<Option<Vec<u32>>>()
                    .ok_or_else(|| malformed(line_num, "face refers to an unknown vertex"))?;
                if corners.len() < 3 {
                    return Err(malformed(line_num, "face needs three vertices"));
                }
                for k in 1..corners.len() - 1 {
                    mesh.add_triangle(corners[0], corners[k], corners[k + 1]);
                }
            }
            _ => {}
        }
    }

    if coloured_vertices == 0 {
        mesh.colours.clear();
    } else if coloured_vertices < mesh.vertices.len() {
        warn!(
            "{}: {} of {} vertices carry a colour, the rest read as white",
            path.display(),
            coloured_vertices,
            mesh.vertices.len()
        );
    }
    Ok(mesh)
}

/// 0-based vertex index of an `f` token (`v`, `v/vt`, `v//vn`, `v/vt/vn`).
/// Negative indices count back from the last vertex read so far.
fn face_index(token: &str, vertex_count: usize) -> Option<u32> {
    let index: i64 = token.split('/').next()?.parse().ok()?;
    let resolved = if index < 0 {
        vertex_count as i64 + index
    } else {
        index - 1
    };
    (0..vertex_count as i64)
        .contains(&resolved)
        .then(|| resolved as u32)
}
