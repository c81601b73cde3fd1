//! Component F: the synonym-dependency graph.
//!
//! `type t = u list` depends on `u`; if `u`'s own definition (transitively)
//! depends back on `t`, expanding either one during unification would
//! never terminate. This module builds the dependency graph over a
//! module's synonym declarations and reuses the Tarjan-style cycle
//! finder from `hiveml_types::cycle` — the same one `generalize` uses
//! for its own, unrelated, corrupted-store guard — rather than a second
//! bespoke implementation.

use rustc_hash::FxHashMap;

use hiveml_ids::SynonymId;
use hiveml_types::{cycle, Domain, Row, TypeDefStore, Type};

#[derive(Debug, Default)]
pub struct SynonymGraph {
    edges: FxHashMap<SynonymId, Vec<SynonymId>>,
}

fn synonym_refs(ty: &Type, out: &mut Vec<SynonymId>) {
    match ty {
        Type::Data(hiveml_types::DataTypeId::Synonym(id), args) => {
            out.push(*id);
            args.iter().for_each(|t| synonym_refs(t, out));
        }
        Type::Data(_, args) => args.iter().for_each(|t| synonym_refs(t, out)),
        Type::Scalar(_) | Type::Var(_) | Type::Bound(_) => {}
        Type::Product(items) => items.iter().for_each(|t| synonym_refs(t, out)),
        Type::Record(row) => synonym_refs_in_row(row, out),
        Type::Function(dom, ret) => {
            synonym_refs_in_domain(dom, out);
            synonym_refs(ret, out);
        }
        Type::Effectful(dom, eff, ret) => {
            synonym_refs_in_domain(dom, out);
            synonym_refs(eff, out);
            synonym_refs(ret, out);
        }
        Type::Pid(inner) => synonym_refs(inner, out),
    }
}

fn synonym_refs_in_domain(dom: &Domain, out: &mut Vec<SynonymId>) {
    dom.ordered.iter().for_each(|t| synonym_refs(t, out));
    dom.mandatory.values().for_each(|t| synonym_refs(t, out));
    synonym_refs_in_row(&dom.optional, out);
}

fn synonym_refs_in_row(row: &Row, out: &mut Vec<SynonymId>) {
    if let Row::Fixed(labels) = row {
        labels.values().for_each(|t| synonym_refs(t, out));
    }
}

impl SynonymGraph {
    /// Builds the full dependency graph for every synonym registered in
    /// `defs`.
    pub fn build(defs: &TypeDefStore) -> Self {
        let mut edges = FxHashMap::default();
        for id in defs.synonym_ids() {
            let def = defs.synonym(id);
            let mut refs = Vec::new();
            synonym_refs(&def.body, &mut refs);
            edges.insert(id, refs);
        }
        SynonymGraph { edges }
    }

    pub fn depends_on(&self, id: SynonymId) -> &[SynonymId] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Returns every cyclic group of mutually dependent synonyms. An empty
/// result means every synonym in the graph eventually expands to a
/// synonym-free type.
pub fn synonym_cycles(graph: &SynonymGraph) -> Vec<Vec<SynonymId>> {
    let nodes: Vec<SynonymId> = graph.edges.keys().copied().collect();
    cycle::find_cycles(&nodes, |id| graph.depends_on(*id).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveml_ids::BoundId;
    use hiveml_types::{DataTypeId, SynonymDef};

    fn synonym(id: SynonymId, body: Type) -> (SynonymId, SynonymDef) {
        (id, SynonymDef { name: format!("s{}", id.index()), params: Vec::<BoundId>::new(), body, module_path: vec![] })
    }

    #[test]
    fn acyclic_synonyms_report_no_cycle() {
        let mut defs = TypeDefStore::new();
        let (a, def_a) = synonym(SynonymId(0), Type::INT);
        defs.register_synonym(a, def_a);
        let (b, def_b) = synonym(SynonymId(1), Type::Data(DataTypeId::Synonym(a), vec![]));
        defs.register_synonym(b, def_b);

        let graph = SynonymGraph::build(&defs);
        assert!(synonym_cycles(&graph).is_empty());
    }

    #[test]
    fn mutually_recursive_synonyms_are_reported() {
        let mut defs = TypeDefStore::new();
        let a = SynonymId(0);
        let b = SynonymId(1);
        defs.register_synonym(
            a,
            SynonymDef { name: "a".into(), params: vec![], body: Type::Data(DataTypeId::Synonym(b), vec![]), module_path: vec![] },
        );
        defs.register_synonym(
            b,
            SynonymDef { name: "b".into(), params: vec![], body: Type::Data(DataTypeId::Synonym(a), vec![]), module_path: vec![] },
        );

        let graph = SynonymGraph::build(&defs);
        let cycles = synonym_cycles(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }
}
