use std::f32::consts::PI;
use std::rc::Rc;

use log::debug;

use crate::render::{GpuBackend, MeshHandle};

/// Interleaved `position.xyz`, `normal.xyz`, `uv.xy`.
pub const FLOATS_PER_VERTEX: usize = 8;

/// CPU-side indexed triangle mesh ready for upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    /// UV sphere of radius one centred at the origin.
    pub fn unit_sphere(stacks: u32, slices: u32) -> Self {
        let stacks = stacks.max(2);
        let slices = slices.max(3);
        let mut vertices = Vec::with_capacity(((stacks + 1) * (slices + 1)) as usize * FLOATS_PER_VERTEX);
        for stack in 0..=stacks {
            let v = stack as f32 / stacks as f32;
            let phi = v * PI;
            for slice in 0..=slices {
                let u = slice as f32 / slices as f32;
                let theta = u * 2.0 * PI;
                let x = phi.sin() * theta.cos();
                let y = phi.cos();
                let z = phi.sin() * theta.sin();
                // unit sphere: the normal is the position
                vertices.extend_from_slice(&[x, y, z, x, y, z, 1.0 - u, v]);
            }
        }

        let ring = slices + 1;
        let mut indices = Vec::with_capacity((stacks * slices * 6) as usize);
        for stack in 0..stacks {
            for slice in 0..slices {
                let a = stack * ring + slice;
                let b = a + ring;
                // counter-clockwise seen from outside
                indices.extend_from_slice(&[a, a + 1, b, b, a + 1, b + 1]);
            }
        }
        Self { vertices, indices }
    }

    /// Unit quad in the XY plane facing +Z, used as the in-room screen.
    pub fn screen_quad() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            // position          normal          uv
            -1.0, -1.0, 0.0,     0.0, 0.0, 1.0,  0.0, 1.0,
             1.0, -1.0, 0.0,     0.0, 0.0, 1.0,  1.0, 1.0,
             1.0,  1.0, 0.0,     0.0, 0.0, 1.0,  1.0, 0.0,
            -1.0,  1.0, 0.0,     0.0, 0.0, 1.0,  0.0, 0.0,
        ];
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }
}

/// Mesh geometry resident on the GPU.
///
/// Objects hold it through [`SharedMesh`]; the GPU copy is released by
/// [`Mesh::release`] once the last holder lets go.
#[derive(Debug, PartialEq, Eq)]
pub struct Mesh {
    pub label: String,
    pub handle: MeshHandle,
    pub index_count: u32,
}

pub type SharedMesh = Rc<Mesh>;

impl Mesh {
    pub fn upload(gpu: &mut dyn GpuBackend, label: &str, data: &MeshData) -> SharedMesh {
        let handle = gpu.create_mesh(label, data);
        debug!(
            "uploaded mesh {label}: {} vertices, {} indices",
            data.vertex_count(),
            data.indices.len()
        );
        Rc::new(Self {
            label: label.to_string(),
            handle,
            index_count: data.indices.len() as u32,
        })
    }

    /// Drops one reference; destroys the GPU mesh when it was the last one.
    ///
    /// Returns `true` if the geometry was destroyed.
    pub fn release(mesh: SharedMesh, gpu: &mut dyn GpuBackend) -> bool {
        match Rc::into_inner(mesh) {
            Some(mesh) => {
                debug!("destroying mesh {}", mesh.label);
                gpu.destroy_mesh(mesh.handle);
                true
            }
            None => false,
        }
    }
}
