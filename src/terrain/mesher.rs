/// Mesh Assembly
///
/// Turns the triangle soup a march produces into a chunk's renderable
/// mesh. Flat shading duplicates vertices and derives one normal per
/// face from the winding; smooth shading welds vertices by position
/// and averages the kernel's gradient normals per unique position.

use std::collections::HashMap;

use cgmath::{InnerSpace, Vector3};

use crate::terrain::chunk::ChunkMesh;
use crate::terrain::compute::VertexData;

/// Rebuild `mesh` in place from `count * 3` kernel vertices
pub fn build_mesh(vertices: &[VertexData], flat_shading: bool, mesh: &mut ChunkMesh) {
    mesh.clear();
    if flat_shading {
        build_flat(vertices, mesh);
    } else {
        build_smooth(vertices, mesh);
    }
}

fn build_flat(vertices: &[VertexData], mesh: &mut ChunkMesh) {
    for triangle in vertices.chunks_exact(3) {
        let a = Vector3::from(triangle[0].position);
        let b = Vector3::from(triangle[1].position);
        let c = Vector3::from(triangle[2].position);
        let cross = (b - a).cross(c - a);
        let normal = if cross.magnitude2() > 1e-12 {
            cross.normalize()
        } else {
            Vector3::from(triangle[0].normal)
        };

        for vertex in triangle {
            mesh.indices.push(mesh.positions.len() as u32);
            mesh.positions.push(vertex.position);
            mesh.normals.push([normal.x, normal.y, normal.z]);
        }
    }
}

fn build_smooth(vertices: &[VertexData], mesh: &mut ChunkMesh) {
    // Edge intersections are computed from identical inputs on shared
    // edges, so welding by exact bit pattern is sufficient.
    let mut welded: HashMap<[u32; 3], u32> = HashMap::with_capacity(vertices.len());

    for vertex in vertices {
        let key = [
            vertex.position[0].to_bits(),
            vertex.position[1].to_bits(),
            vertex.position[2].to_bits(),
        ];
        let index = *welded.entry(key).or_insert_with(|| {
            mesh.positions.push(vertex.position);
            mesh.normals.push([0.0; 3]);
            (mesh.positions.len() - 1) as u32
        });
        let n = &mut mesh.normals[index as usize];
        n[0] += vertex.normal[0];
        n[1] += vertex.normal[1];
        n[2] += vertex.normal[2];
        mesh.indices.push(index);
    }

    for n in mesh.normals.iter_mut() {
        let v = Vector3::new(n[0], n[1], n[2]);
        if v.magnitude2() > 1e-12 {
            let v = v.normalize();
            *n = [v.x, v.y, v.z];
        } else {
            *n = [0.0, 1.0, 0.0];
        }
    }
}
