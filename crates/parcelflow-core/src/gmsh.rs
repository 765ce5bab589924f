//! Loading carrier meshes generated with [`gmsh`](https://www.gmsh.info/).
//!
//! Only version 4.1 of the MSH format is supported,
//! as per the [`mshio`] library.

use fixedbitset as fb;
use std::collections::{HashMap, HashSet};

use crate::{TetMesh, Vec3};

/// Error in loading a mesh from a Gmsh .msh file.
#[derive(thiserror::Error, Debug)]
pub enum GmshError {
    /// Error parsing the .msh file.
    ///
    /// (Implementation note: parser error converted to string
    /// to avoid lifetime issues with the byte slices it contains)
    #[error("Parsing the .msh data failed: {0}")]
    ParseError(String),
    /// The given .msh file contains no nodes.
    #[error("Invalid .msh data: no nodes")]
    MissingNodes,
    /// The given .msh file contains no tetrahedra.
    #[error("Invalid .msh data: no elements of the correct type")]
    MissingElements,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EntityId {
    dim: i32,
    tag: i32,
}

#[derive(Clone, Debug, Default)]
struct PhysicalGroup {
    entities: HashSet<EntityId>,
    nodes: HashSet<usize>,
}

/// Load a tetrahedral mesh from a `.msh` file.
///
/// First-order tetrahedron elements in the file are interpreted as the cells of the mesh.
/// These must be of type `Tet4` (see [`ElementType`][mshio::ElementType]).
/// Other elements (boundary triangles, lines, points) are ignored.
///
/// # Physical groups
///
/// If the .msh file contains physical groups,
/// a cell zone is generated for each of them.
/// These can be looked up with the physical group's integer tag
/// using [`cell_zone`][crate::TetMesh::cell_zone].
///
/// A cell belongs to a zone if **every** one of its vertices belongs to the group,
/// so a physical volume must also contain its boundary entities
/// for the cells touching its boundary to be included.
pub fn load_tetmesh(bytes: &[u8]) -> Result<TetMesh, GmshError> {
    let msh = mshio::parse_msh_bytes(bytes).map_err(|e| GmshError::ParseError(format!("{}", e)))?;
    let nodes = msh.data.nodes.ok_or(GmshError::MissingNodes)?;
    let elements = msh.data.elements.ok_or(GmshError::MissingElements)?;

    let mut physical_groups = gather_physical_groups(msh.data.entities.as_ref());

    let mut vertices: Vec<Vec3> = Vec::new();
    for block in &nodes.node_blocks {
        let ent_id = EntityId {
            dim: block.entity_dim,
            tag: block.entity_tag,
        };
        let mut phys_groups: Vec<&mut PhysicalGroup> = physical_groups
            .values_mut()
            .filter(|pg| pg.entities.contains(&ent_id))
            .collect();

        for node in &block.nodes {
            let vert_idx = vertices.len();
            vertices.push(Vec3::new(node.x, node.y, node.z));
            for g in &mut phys_groups {
                g.nodes.insert(vert_idx);
            }
        }
    }

    if vertices.is_empty() {
        return Err(GmshError::MissingNodes);
    }

    let indices: Vec<usize> = elements
        .element_blocks
        .iter()
        .filter(|block| block.element_type == mshio::ElementType::Tet4)
        .flat_map(|block| block.elements.iter())
        .flat_map(|el| el.nodes.iter())
        // gmsh tags start at 1, subtract 1 to get the index in the array.
        // (this assumes tags are sequential and in order,
        // which holds for meshes written by gmsh itself)
        .map(|node_tag| match (*node_tag as usize).checked_sub(1) {
            Some(idx) if idx < vertices.len() => Ok(idx),
            _ => Err(GmshError::ParseError(format!(
                "element refers to unknown node {node_tag}"
            ))),
        })
        .collect::<Result<_, _>>()?;
    if indices.is_empty() {
        return Err(GmshError::MissingElements);
    }

    let mut mesh = TetMesh::new(vertices, indices);

    // generate cell zones from the vertices' physical group associations
    for (group_id, group) in physical_groups.iter() {
        let cells: fb::FixedBitSet = (0..mesh.cell_count())
            .filter(|c| {
                mesh.cell_vertices(*c)
                    .iter()
                    .all(|v| group.nodes.contains(v))
            })
            .collect();
        mesh.store_cell_zone(format!("{}", group_id), cells);
    }

    Ok(mesh)
}

/// Collect the physical groups defined in a .msh file
/// into a structure we can easily look them up from.
///
/// This only populates the `entities` field of each group;
/// nodes are filled in while loading them.
fn gather_physical_groups(
    entities: Option<&mshio::Entities<i32, f64>>,
) -> HashMap<i32, PhysicalGroup> {
    let Some(entities) = entities else {
        return HashMap::new();
    };

    let mut groups: HashMap<i32, PhysicalGroup> = HashMap::new();
    let mut insert = |dim: i32, tag: i32, physical_tags: &[i32]| {
        for ptag in physical_tags {
            groups
                .entry(*ptag)
                .or_default()
                .entities
                .insert(EntityId { dim, tag });
        }
    };

    for point in &entities.points {
        insert(0, point.tag, &point.physical_tags);
    }
    for curve in &entities.curves {
        insert(1, curve.tag, &curve.physical_tags);
    }
    for surface in &entities.surfaces {
        insert(2, surface.tag, &surface.physical_tags);
    }
    for volume in &entities.volumes {
        insert(3, volume.tag, &volume.physical_tags);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // two tetrahedra sharing the face (2, 3, 4).
    // both volumes are in physical group 7, the second one also in group 9
    const TWO_TETS: &str = "$MeshFormat
4.1 0 8
$EndMeshFormat
$Entities
0 0 0 2
1 0 0 0 1 1 1 1 7 0
2 0 0 0 1 1 1 2 7 9 0
$EndEntities
$Nodes
2 5 1 5
3 1 0 4
1
2
3
4
0 0 0
1 0 0
0 1 0
0 0 1
3 2 0 1
5
1 1 1
$EndNodes
$Elements
2 2 1 2
3 1 4 1
1 1 2 3 4
3 2 4 1
2 2 3 4 5
$EndElements
";

    #[test]
    fn load_two_tets() {
        let mesh = load_tetmesh(TWO_TETS.as_bytes()).expect("Failed to load mesh");

        assert_eq!(mesh.vertices().len(), 5);
        assert_eq!(mesh.cell_count(), 2);
        assert_relative_eq!(mesh.volume(0), 1. / 6., epsilon = 1e-12);
        // the shared face is the only interior one
        assert_eq!(mesh.face_count(), 7);
        assert_eq!(mesh.boundary_faces().count_ones(..), 6);
    }

    #[test]
    fn physical_groups_become_cell_zones() {
        let mesh = load_tetmesh(TWO_TETS.as_bytes()).expect("Failed to load mesh");

        let zone_7 = mesh.cell_zone("7").expect("zone didn't exist");
        itertools::assert_equal(zone_7.ones(), [0, 1]);

        // the nodes shared with the first volume belong to its entity,
        // so the second cell doesn't have all of its vertices in group 9
        let zone_9 = mesh.cell_zone("9").expect("zone didn't exist");
        assert_eq!(zone_9.count_ones(..), 0);

        assert!(mesh.cell_zone("8").is_none());
    }

    #[test]
    fn empty_data_is_an_error() {
        let res = load_tetmesh(b"$MeshFormat\n4.1 0 8\n$EndMeshFormat\n");
        assert!(matches!(res, Err(GmshError::MissingNodes)));
    }
}
