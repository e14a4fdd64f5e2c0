use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use crate::{
    Float,
    error::Result,
    geometry::Geometry,
    grid::Dimensions,
    lattice::D3Q27,
    publisher::FrameSnapshot,
};

/// Writes published frames as legacy ASCII VTK structured grids.
pub struct VTKWriter {
    dims: Dimensions,
    dx: Float,
    collection_entries: Vec<(u64, String)>, // (frame, filename)
}

impl VTKWriter {
    pub fn new(dims: Dimensions, dx: Float) -> Self {
        Self {
            dims,
            dx,
            collection_entries: Vec::new(),
        }
    }

    pub fn write(&mut self, filename: &str, snapshot: &FrameSnapshot, geometry: &Geometry) -> Result<()> {
        let mut file = BufWriter::new(File::create(filename)?);
        self.collection_entries.push((snapshot.frame(), filename.to_string()));

        writeln!(file, "# vtk DataFile Version 3.0")?;
        writeln!(file, "LBM Solution - Frame {}", snapshot.frame())?;
        self.write_grid_header(&mut file)?;

        writeln!(file, "POINT_DATA {}", self.dims.node_count())?;

        writeln!(file, "SCALARS Density float")?;
        writeln!(file, "LOOKUP_TABLE default")?;
        for rho in snapshot.density() {
            writeln!(file, "{:.6}", rho)?;
        }

        writeln!(file, "VECTORS Velocity float")?;
        for u in snapshot.velocity() {
            writeln!(file, "{:.6} {:.6} {:.6}", u[0], u[1], u[2])?;
        }

        writeln!(file, "SCALARS VelocityMagnitude float")?;
        writeln!(file, "LOOKUP_TABLE default")?;
        for u in snapshot.velocity() {
            writeln!(file, "{:.6}", (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt())?;
        }

        // Lattice pressure deviation from the reference density, p = cs² (ρ - 1)
        writeln!(file, "SCALARS Pressure float")?;
        writeln!(file, "LOOKUP_TABLE default")?;
        for rho in snapshot.density() {
            writeln!(file, "{:.6}", (rho - 1.0) * D3Q27::CS2)?;
        }

        self.write_node_types(&mut file, geometry)?;

        let vorticity = self.calculate_vorticity(snapshot, geometry);
        writeln!(file, "VECTORS Vorticity float")?;
        for w in &vorticity {
            writeln!(file, "{:.6} {:.6} {:.6}", w[0], w[1], w[2])?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn write_geometry(&self, filename: &str, geometry: &Geometry) -> Result<()> {
        let mut file = BufWriter::new(File::create(filename)?);

        writeln!(file, "# vtk DataFile Version 3.0")?;
        writeln!(file, "LBM Geometry")?;
        self.write_grid_header(&mut file)?;
        writeln!(file, "POINT_DATA {}", self.dims.node_count())?;
        self.write_node_types(&mut file, geometry)?;

        file.flush()?;
        Ok(())
    }

    /// Write a ParaView collection file that groups all VTK files by frame
    pub fn write_collection(&self, collection_filename: &str) -> Result<()> {
        let mut file = BufWriter::new(File::create(collection_filename)?);

        writeln!(file, "<?xml version=\"1.0\"?>")?;
        writeln!(file, "<VTKFile type=\"Collection\" version=\"0.1\">")?;
        writeln!(file, "  <Collection>")?;

        for (frame, filename) in &self.collection_entries {
            let basename = Path::new(filename)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(filename);
            writeln!(file, "    <DataSet timestep=\"{}\" part=\"0\" file=\"{}\"/>", frame, basename)?;
        }

        writeln!(file, "  </Collection>")?;
        writeln!(file, "</VTKFile>")?;

        file.flush()?;
        Ok(())
    }

    pub fn get_file_count(&self) -> usize {
        self.collection_entries.len()
    }

    fn write_grid_header(&self, file: &mut impl Write) -> Result<()> {
        let Dimensions { nx, ny, nz } = self.dims;
        writeln!(file, "ASCII")?;
        writeln!(file, "DATASET STRUCTURED_GRID")?;
        writeln!(file, "DIMENSIONS {} {} {}", nx, ny, nz)?;
        writeln!(file, "POINTS {} float", self.dims.node_count())?;
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let x = i as Float * self.dx;
                    let y = j as Float * self.dx;
                    let z = k as Float * self.dx;
                    writeln!(file, "{} {} {}", x, y, z)?;
                }
            }
        }
        Ok(())
    }

    fn write_node_types(&self, file: &mut impl Write, geometry: &Geometry) -> Result<()> {
        writeln!(file, "SCALARS NodeType float")?;
        writeln!(file, "LOOKUP_TABLE default")?;
        for node_type in geometry.node_types() {
            writeln!(file, "{:.1}", node_type.code() as f32)?;
        }
        Ok(())
    }

    /// Central-difference curl on interior fluid nodes, zero elsewhere.
    fn calculate_vorticity(&self, snapshot: &FrameSnapshot, geometry: &Geometry) -> Vec<[Float; 3]> {
        let Dimensions { nx, ny, nz } = self.dims;
        let velocity = snapshot.velocity();
        let h = 2.0 * self.dx;
        let mut vorticity = vec![[0.0; 3]; velocity.len()];

        if nx < 3 || ny < 3 || nz < 3 {
            return vorticity;
        }

        for k in 1..nz - 1 {
            for j in 1..ny - 1 {
                for i in 1..nx - 1 {
                    if !geometry.is_fluid(i, j, k) {
                        continue;
                    }
                    let at = |x, y, z| velocity[self.dims.linear_index(x, y, z)];
                    let (xp, xm) = (at(i + 1, j, k), at(i - 1, j, k));
                    let (yp, ym) = (at(i, j + 1, k), at(i, j - 1, k));
                    let (zp, zm) = (at(i, j, k + 1), at(i, j, k - 1));

                    vorticity[self.dims.linear_index(i, j, k)] = [
                        (yp[2] - ym[2]) / h - (zp[1] - zm[1]) / h,
                        (zp[0] - zm[0]) / h - (xp[2] - xm[2]) / h,
                        (xp[1] - xm[1]) / h - (yp[0] - ym[0]) / h,
                    ];
                }
            }
        }

        vorticity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::FramePublisher;

    #[test]
    fn writes_frame_geometry_and_collection() {
        let dir = tempfile::tempdir().unwrap();
        let dims = Dimensions::new(3, 3, 3).unwrap();
        let geometry = Geometry::periodic(dims);

        let mut publisher = FramePublisher::new(27).unwrap();
        publisher.publish(5, &[1.0; 27], &[[0.01, 0.0, 0.0]; 27]).unwrap();
        let snapshot = publisher.reader().snapshot();

        let mut writer = VTKWriter::new(dims, 0.5);
        let frame_path = dir.path().join("output_000005.vtk");
        writer.write(frame_path.to_str().unwrap(), &snapshot, &geometry).unwrap();
        assert_eq!(writer.get_file_count(), 1);

        let text = std::fs::read_to_string(&frame_path).unwrap();
        assert!(text.contains("LBM Solution - Frame 5"));
        assert!(text.contains("DIMENSIONS 3 3 3"));
        assert!(text.contains("POINT_DATA 27"));
        assert!(text.contains("VECTORS Vorticity float"));

        let geometry_path = dir.path().join("geometry.vtk");
        writer.write_geometry(geometry_path.to_str().unwrap(), &geometry).unwrap();
        assert!(std::fs::read_to_string(&geometry_path).unwrap().contains("SCALARS NodeType float"));

        let collection_path = dir.path().join("frames.pvd");
        writer.write_collection(collection_path.to_str().unwrap()).unwrap();
        let collection = std::fs::read_to_string(&collection_path).unwrap();
        assert!(collection.contains("file=\"output_000005.vtk\""));
    }
}
