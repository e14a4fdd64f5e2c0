use log::info;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use stl_io::read_stl;
use crate::{
    Float,
    error::{LbmError, Result},
    grid::Dimensions,
};

/// Collision behaviour of a node, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum NodeType {
    /// BGK relaxation
    #[default]
    Fluid = 0,
    /// Bounce-back no-slip wall
    Reflective = 1,
    /// Equilibrium at the imposed inflow velocity
    InOutFlow = 2,
    /// Equilibrium at rest, absorbs everything that arrives
    Sink = 3,
}

impl NodeType {
    pub const ALL: [NodeType; 4] = [
        NodeType::Fluid,
        NodeType::Reflective,
        NodeType::InOutFlow,
        NodeType::Sink,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for NodeType {
    type Error = u32;

    fn try_from(code: u32) -> std::result::Result<Self, u32> {
        match code {
            0 => Ok(NodeType::Fluid),
            1 => Ok(NodeType::Reflective),
            2 => Ok(NodeType::InOutFlow),
            3 => Ok(NodeType::Sink),
            other => Err(other),
        }
    }
}

/// How the node classification is produced at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundaryPreset {
    /// Every node is fluid; edges wrap.
    Periodic,
    /// A cylinder along the y axis, inflow on the x = 0 face and a sink on
    /// the x = nx - 1 face. `walls` turns the z = 0 and z = nz - 1 faces into
    /// reflective walls.
    CylinderInChannel {
        radius: Float,
        #[serde(default)]
        walls: bool,
    },
    /// Voxelized STL obstacle, inflow and sink faces as for the cylinder.
    Stl { path: String },
    /// One raw node type code per node, in linear index order.
    TypeCodes { codes: Vec<u32> },
}

impl Default for BoundaryPreset {
    fn default() -> Self {
        BoundaryPreset::CylinderInChannel { radius: 4.0, walls: true }
    }
}

#[derive(Debug, Clone)]
pub struct Geometry {
    dims: Dimensions,
    node_types: Vec<NodeType>,
}

impl Geometry {
    pub fn from_preset(preset: &BoundaryPreset, dims: Dimensions, dx: Float) -> Result<Self> {
        let geometry = match preset {
            BoundaryPreset::Periodic => Self::periodic(dims),
            BoundaryPreset::CylinderInChannel { radius, walls } => {
                Self::cylinder_in_channel(dims, *radius, *walls)
            }
            BoundaryPreset::Stl { path } => Self::from_stl(path, dims, dx)?,
            BoundaryPreset::TypeCodes { codes } => Self::from_codes(dims, codes)?,
        };
        geometry.log_summary();
        Ok(geometry)
    }

    /// Classifies every node with `classify(x, y, z, dims)`.
    pub fn from_predicate<F>(dims: Dimensions, classify: F) -> Self
    where
        F: Fn(usize, usize, usize, &Dimensions) -> NodeType,
    {
        let mut node_types = Vec::with_capacity(dims.node_count());
        for z in 0..dims.nz {
            for y in 0..dims.ny {
                for x in 0..dims.nx {
                    node_types.push(classify(x, y, z, &dims));
                }
            }
        }
        Self { dims, node_types }
    }

    /// Like [`Geometry::from_predicate`] for predicates producing raw codes.
    /// The first unrecognized code aborts construction.
    pub fn from_code_predicate<F>(dims: Dimensions, classify: F) -> Result<Self>
    where
        F: Fn(usize, usize, usize, &Dimensions) -> u32,
    {
        let mut codes = Vec::with_capacity(dims.node_count());
        for z in 0..dims.nz {
            for y in 0..dims.ny {
                for x in 0..dims.nx {
                    codes.push(classify(x, y, z, &dims));
                }
            }
        }
        Self::from_codes(dims, &codes)
    }

    pub fn from_codes(dims: Dimensions, codes: &[u32]) -> Result<Self> {
        if codes.len() != dims.node_count() {
            return Err(LbmError::GeometryMismatch {
                expected: dims.node_count(),
                actual: codes.len(),
            });
        }
        let node_types = codes
            .iter()
            .enumerate()
            .map(|(node, &code)| {
                NodeType::try_from(code).map_err(|code| LbmError::UnknownNodeType { code, node })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { dims, node_types })
    }

    pub fn periodic(dims: Dimensions) -> Self {
        Self::from_predicate(dims, |_, _, _, _| NodeType::Fluid)
    }

    pub fn cylinder_in_channel(dims: Dimensions, radius: Float, walls: bool) -> Self {
        let cx = dims.nx as Float / 4.0;
        let cz = dims.nz as Float / 2.0;
        let r2 = radius * radius;

        Self::from_predicate(dims, move |x, _y, z, dims| {
            if x == 0 {
                return NodeType::InOutFlow;
            }
            if x + 1 == dims.nx {
                return NodeType::Sink;
            }
            if walls && (z == 0 || z + 1 == dims.nz) {
                return NodeType::Reflective;
            }
            let ddx = x as Float + 0.5 - cx;
            let ddz = z as Float + 0.5 - cz;
            if ddx * ddx + ddz * ddz < r2 {
                NodeType::Reflective
            } else {
                NodeType::Fluid
            }
        })
    }

    pub fn from_stl(stl_path: &str, dims: Dimensions, dx: Float) -> Result<Self> {
        let mut file = std::fs::File::open(stl_path)?;
        let stl = read_stl(&mut file)?;

        let mut node_types = vec![NodeType::Fluid; dims.node_count()];

        // Convert STL mesh to voxelized geometry
        for face in &stl.faces {
            let vertex = |k: usize| {
                let v = &stl.vertices[face.vertices[k]];
                Point3::new(v[0], v[1], v[2])
            };
            let triangle = [vertex(0), vertex(1), vertex(2)];
            voxelize_triangle(&triangle, &dims, dx, &mut node_types);
        }

        // Inflow and sink faces win over anything the mesh marked
        for z in 0..dims.nz {
            for y in 0..dims.ny {
                node_types[dims.linear_index(0, y, z)] = NodeType::InOutFlow;
                node_types[dims.linear_index(dims.nx - 1, y, z)] = NodeType::Sink;
            }
        }

        Ok(Self { dims, node_types })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn node_types(&self) -> &[NodeType] {
        &self.node_types
    }

    pub fn node_type(&self, x: usize, y: usize, z: usize) -> NodeType {
        self.node_types[self.dims.linear_index(x, y, z)]
    }

    pub fn count(&self, node_type: NodeType) -> usize {
        self.node_types.iter().filter(|&&t| t == node_type).count()
    }

    pub fn is_fluid(&self, x: usize, y: usize, z: usize) -> bool {
        self.node_type(x, y, z) == NodeType::Fluid
    }

    pub fn is_solid(&self, x: usize, y: usize, z: usize) -> bool {
        self.node_type(x, y, z) == NodeType::Reflective
    }

    fn log_summary(&self) {
        info!(
            "Geometry: {} fluid, {} reflective, {} in/out-flow, {} sink nodes",
            self.count(NodeType::Fluid),
            self.count(NodeType::Reflective),
            self.count(NodeType::InOutFlow),
            self.count(NodeType::Sink)
        );
    }
}

fn voxelize_triangle(
    vertices: &[Point3<f32>; 3],
    dims: &Dimensions,
    dx: Float,
    node_types: &mut [NodeType],
) {
    let lo = |axis: usize| vertices.iter().map(|v| v[axis]).fold(f32::INFINITY, f32::min);
    let hi = |axis: usize| vertices.iter().map(|v| v[axis]).fold(f32::NEG_INFINITY, f32::max);
    let to_index = |value: f32, extent: usize, round: fn(f32) -> f32| {
        (round(value / dx) as i64).clamp(0, extent as i64 - 1) as usize
    };

    let (i_min, i_max) = (to_index(lo(0), dims.nx, f32::floor), to_index(hi(0), dims.nx, f32::ceil));
    let (j_min, j_max) = (to_index(lo(1), dims.ny, f32::floor), to_index(hi(1), dims.ny, f32::ceil));
    let (k_min, k_max) = (to_index(lo(2), dims.nz, f32::floor), to_index(hi(2), dims.nz, f32::ceil));

    // Majority vote over a 3x3x3 sample lattice inside each voxel
    let samples_per_axis = 3;
    let total_samples = samples_per_axis * samples_per_axis * samples_per_axis;
    let thickness = dx * 0.8;

    for k in k_min..=k_max {
        for j in j_min..=j_max {
            for i in i_min..=i_max {
                let mut inside_count = 0;
                for si in 0..samples_per_axis {
                    for sj in 0..samples_per_axis {
                        for sk in 0..samples_per_axis {
                            let offset = |s: usize| (s as f32 + 0.5) / samples_per_axis as f32;
                            let point = Point3::new(
                                (i as f32 + offset(si)) * dx,
                                (j as f32 + offset(sj)) * dx,
                                (k as f32 + offset(sk)) * dx,
                            );
                            if point_triangle_distance(&point, vertices) < thickness {
                                inside_count += 1;
                            }
                        }
                    }
                }
                if inside_count > total_samples / 2 {
                    node_types[dims.linear_index(i, j, k)] = NodeType::Reflective;
                }
            }
        }
    }
}

fn point_triangle_distance(point: &Point3<f32>, triangle: &[Point3<f32>; 3]) -> f32 {
    let v0 = triangle[1] - triangle[0];
    let v1 = triangle[2] - triangle[0];
    let v2 = point - triangle[0];

    let dot00 = v0.dot(&v0);
    let dot01 = v0.dot(&v1);
    let dot02 = v0.dot(&v2);
    let dot11 = v1.dot(&v1);
    let dot12 = v1.dot(&v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() > f32::EPSILON {
        let u = (dot11 * dot02 - dot01 * dot12) / denom;
        let v = (dot00 * dot12 - dot01 * dot02) / denom;
        if u >= 0.0 && v >= 0.0 && u + v <= 1.0 {
            let normal = v0.cross(&v1).normalize();
            return v2.dot(&normal).abs();
        }
    }

    let d1 = point_segment_distance(point, &triangle[0], &triangle[1]);
    let d2 = point_segment_distance(point, &triangle[1], &triangle[2]);
    let d3 = point_segment_distance(point, &triangle[2], &triangle[0]);
    d1.min(d2).min(d3)
}

fn point_segment_distance(point: &Point3<f32>, a: &Point3<f32>, b: &Point3<f32>) -> f32 {
    let ab = b - a;
    let ap = point - a;
    let ab_len_sq = ab.dot(&ab);

    if ab_len_sq == 0.0 {
        return ap.magnitude();
    }

    let t = (ap.dot(&ab) / ab_len_sq).clamp(0.0, 1.0);
    let projection = a + ab * t;
    (point - projection).magnitude()
}
