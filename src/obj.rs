use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};

use crate::mesh::{MeshData, FLOATS_PER_VERTEX};

/// Parses an OBJ file from memory into an indexed triangle mesh.
///
/// Vertices are laid out as `position.xyz`, `normal.xyz`, `uv.xy`. Polygons are
/// fan-triangulated and missing normals are computed from face geometry.
pub fn load_obj_from_str(data: &str) -> Result<MeshData> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut faces: Vec<[FaceIndex; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "vt" => uvs.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texture coordinate on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                triangulate_face(&polygon, &mut faces);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let mut mesh = build_mesh(&positions, &normals, &uvs, &faces)?;
    if needs_normals(&mesh.vertices) {
        compute_normals(&mut mesh);
    }
    Ok(mesh)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = parts
        .next()
        .ok_or_else(|| anyhow!("missing texture component"))?
        .parse::<f32>()?;
    // A single-component `vt` is legal; v defaults to zero.
    let v = match parts.next() {
        Some(v) => v.parse::<f32>()?,
        None => 0.0,
    };
    Ok(Vec2::new(u, v))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = optional_index(segments.next())?;
        let vn = optional_index(segments.next())?;
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn optional_index(segment: Option<&str>) -> Result<i32> {
    match segment {
        None | Some("") => Ok(0),
        Some(value) => Ok(value.parse::<i32>()?),
    }
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

fn build_mesh(
    positions: &[Vec3],
    normals: &[Vec3],
    uvs: &[Vec2],
    faces: &[[FaceIndex; 3]],
) -> Result<MeshData> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in faces {
        for idx in face {
            let position =
                fix_index(idx.v, positions.len()).ok_or_else(|| anyhow!("invalid vertex index"))?;
            let key = Key {
                position,
                uv: fix_index(idx.vt, uvs.len()),
                normal: fix_index(idx.vn, normals.len()),
            };
            let next_index = (vertices.len() / FLOATS_PER_VERTEX) as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                let p = positions[key.position];
                let n = key.normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO);
                let t = key.uv.map(|i| uvs[i]).unwrap_or(Vec2::ZERO);
                vertices.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z, t.x, t.y]);
                next_index
            });
            indices.push(*entry);
        }
    }

    Ok(MeshData { vertices, indices })
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then(|| len - abs)
    } else {
        None
    }
}

fn needs_normals(vertices: &[f32]) -> bool {
    vertices
        .chunks_exact(FLOATS_PER_VERTEX)
        .any(|chunk| chunk[3] == 0.0 && chunk[4] == 0.0 && chunk[5] == 0.0)
}

fn compute_normals(mesh: &mut MeshData) {
    let stride = FLOATS_PER_VERTEX;
    let mut accum = vec![Vec3::ZERO; mesh.vertex_count()];

    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let p0 = Vec3::from_slice(&mesh.vertices[i0 * stride..i0 * stride + 3]);
        let p1 = Vec3::from_slice(&mesh.vertices[i1 * stride..i1 * stride + 3]);
        let p2 = Vec3::from_slice(&mesh.vertices[i2 * stride..i2 * stride + 3]);
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        let normal = normal.normalize_or_zero();
        mesh.vertices[i * stride + 3..i * stride + 6].copy_from_slice(&normal.to_array());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices.len(), 3 * FLOATS_PER_VERTEX);
    }

    #[test]
    fn computes_missing_normals() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(obj).unwrap();
        for chunk in mesh.vertices.chunks_exact(FLOATS_PER_VERTEX) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn keeps_texture_coordinates_and_splits_seams() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
                   vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nvt 0.5 0.5\n\
                   vn 0 0 1\n\
                   f 1/1/1 2/2/1 3/3/1 4/4/1\n\
                   f 1/5/1 2/2/1 3/3/1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        // quad fans into two triangles, plus one triangle reusing two corners
        assert_eq!(mesh.indices.len(), 9);
        assert_eq!(mesh.vertex_count(), 5);
        let third = &mesh.vertices[2 * FLOATS_PER_VERTEX..3 * FLOATS_PER_VERTEX];
        assert_eq!(&third[6..8], &[1.0, 1.0]);
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 7\n";
        assert!(load_obj_from_str(obj).is_err());
    }

    #[test]
    fn supports_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }
}
