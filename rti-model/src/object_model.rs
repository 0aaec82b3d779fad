//! The federation-global, module-built object model (spec §3.2, §4.2).
//!
//! Built incrementally from [`ModuleDescription`]s. An element (dimension / update rate /
//! interaction class / object class) is live iff at least one module references it; inserting a
//! module that redeclares an existing element under a name that already exists must match its
//! shape exactly, or the whole module insertion is rejected and rolled back (spec §4.2).

use std::collections::{BTreeMap, BTreeSet};

use rti_core::{
    AttributeHandle, DimensionHandle, InteractionClassHandle, ModuleHandle, ObjectClassHandle,
    ParameterHandle, UpdateRateHandle,
};
use rti_tinymap::{SlotTable, TinyMap};

use crate::error::InconsistentFddError;
use crate::routing::ClassRouting;

/// Message vs. attribute delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderType {
    Receive,
    TimeStamp,
}

/// Transport reliability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransportType {
    Reliable,
    BestEffort,
}

/// A named, bounded routing axis (spec §3.2).
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub upper_bound: u64,
    referring_modules: BTreeSet<ModuleHandle>,
}

/// A named, federate-advisory update rate (spec §3.2).
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRate {
    pub name: String,
    pub rate: f64,
    referring_modules: BTreeSet<ModuleHandle>,
}

/// One parameter of an interaction class, or the name half of an object class attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
}

/// An interaction class node in the class tree (spec §3.2).
#[derive(Debug, Clone)]
pub struct InteractionClassDef {
    pub handle: InteractionClassHandle,
    pub path: String,
    pub parent: Option<InteractionClassHandle>,
    pub children: Vec<InteractionClassHandle>,
    pub order_type: OrderType,
    pub transport_type: TransportType,
    pub dimensions: BTreeSet<DimensionHandle>,
    /// Parameters declared directly on this class (not counting inherited ones).
    pub own_parameters: TinyMap<ParameterHandle, FieldDef>,
    pub routing: ClassRouting,
    referring_modules: BTreeSet<ModuleHandle>,
}

/// An object class node in the class tree (spec §3.2). Attribute 0 of every root class is
/// `privilegeToDelete`.
#[derive(Debug, Clone)]
pub struct ObjectClassDef {
    pub handle: ObjectClassHandle,
    pub path: String,
    pub parent: Option<ObjectClassHandle>,
    pub children: Vec<ObjectClassHandle>,
    pub dimensions: BTreeSet<DimensionHandle>,
    /// Attributes declared directly on this class.
    pub own_attributes: TinyMap<AttributeHandle, AttributeDef>,
    referring_modules: BTreeSet<ModuleHandle>,
}

#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub name: String,
    pub order_type: OrderType,
    pub transport_type: TransportType,
    pub routing: ClassRouting,
}

pub const PRIVILEGE_TO_DELETE: &str = "privilegeToDelete";

/// An incremental FOM contribution, as a federate presents it when joining (spec §3.2, §4.2).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModuleDescription {
    pub dimensions: Vec<DimensionDecl>,
    pub update_rates: Vec<UpdateRateDecl>,
    pub interaction_classes: Vec<InteractionClassDecl>,
    pub object_classes: Vec<ObjectClassDecl>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DimensionDecl {
    pub name: String,
    pub upper_bound: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UpdateRateDecl {
    pub name: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InteractionClassDecl {
    pub path: String,
    pub order_type: OrderTypeDecl,
    pub transport_type: TransportTypeDecl,
    pub dimensions: Vec<String>,
    /// Only the parameters this module itself declares for this class; absent for a module that
    /// merely references an already-known class.
    pub parameters: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectClassDecl {
    pub path: String,
    pub dimensions: Vec<String>,
    pub attributes: Option<Vec<AttributeDecl>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    pub order_type: OrderTypeDecl,
    pub transport_type: TransportTypeDecl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderTypeDecl {
    Receive,
    TimeStamp,
}

impl From<OrderTypeDecl> for OrderType {
    fn from(value: OrderTypeDecl) -> Self {
        match value {
            OrderTypeDecl::Receive => OrderType::Receive,
            OrderTypeDecl::TimeStamp => OrderType::TimeStamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransportTypeDecl {
    Reliable,
    BestEffort,
}

impl From<TransportTypeDecl> for TransportType {
    fn from(value: TransportTypeDecl) -> Self {
        match value {
            TransportTypeDecl::Reliable => TransportType::Reliable,
            TransportTypeDecl::BestEffort => TransportType::BestEffort,
        }
    }
}

/// The federation-global object model (spec §3.2): everything known about dimensions, update
/// rates, interaction classes and object classes, keyed by name path, plus the modules that
/// reference them. Uses [`SlotTable`] (not `TinyMap`) because an element's handle is released and
/// may be reissued once its last referring module is erased (spec §3.6).
#[derive(Debug, Default)]
pub struct ObjectModel {
    pub dimensions: SlotTable<DimensionHandle, Dimension>,
    pub update_rates: SlotTable<UpdateRateHandle, UpdateRate>,
    pub interaction_classes: SlotTable<InteractionClassHandle, InteractionClassDef>,
    pub object_classes: SlotTable<ObjectClassHandle, ObjectClassDef>,
    pub modules: SlotTable<ModuleHandle, ModuleContents>,

    dimensions_by_name: BTreeMap<String, DimensionHandle>,
    update_rates_by_name: BTreeMap<String, UpdateRateHandle>,
    interaction_classes_by_path: BTreeMap<String, InteractionClassHandle>,
    object_classes_by_path: BTreeMap<String, ObjectClassHandle>,
}

/// What a single module contributed, so its erase can release exactly those entries (spec §3.2,
/// §3.6: "when its last referring Module is erased, the entity and its handle are released").
#[derive(Debug, Default, Clone)]
pub struct ModuleContents {
    pub dimensions: BTreeSet<DimensionHandle>,
    pub update_rates: BTreeSet<UpdateRateHandle>,
    pub interaction_classes: BTreeSet<InteractionClassHandle>,
    pub object_classes: BTreeSet<ObjectClassHandle>,
}

impl ObjectModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incrementally builds the model from `module` (spec §4.2). On any semantic mismatch, rolls
    /// back every element this call itself inserted and returns `Err`.
    pub fn insert(&mut self, module: ModuleDescription) -> Result<ModuleHandle, InconsistentFddError> {
        let mut contents = ModuleContents::default();
        // The module handle is needed to tag referrers while building; reserve one up front and
        // release it again if the module turns out to be inconsistent.
        let module_handle = self.modules.insert(ModuleContents::default());

        match self.insert_inner(&module, module_handle, &mut contents) {
            Ok(()) => {
                *self.modules.get_mut(module_handle).expect("just inserted") = contents;
                Ok(module_handle)
            }
            Err(err) => {
                self.rollback(module_handle, contents);
                self.modules.remove(module_handle);
                Err(err)
            }
        }
    }

    fn insert_inner(
        &mut self,
        module: &ModuleDescription,
        module_handle: ModuleHandle,
        contents: &mut ModuleContents,
    ) -> Result<(), InconsistentFddError> {
        for dim in &module.dimensions {
            let handle = self.insert_dimension(dim, module_handle)?;
            contents.dimensions.insert(handle);
        }
        for rate in &module.update_rates {
            let handle = self.insert_update_rate(rate, module_handle)?;
            contents.update_rates.insert(handle);
        }
        for ic in &module.interaction_classes {
            let handle = self.insert_interaction_class(ic, module_handle)?;
            contents.interaction_classes.insert(handle);
        }
        for oc in &module.object_classes {
            let handle = self.insert_object_class(oc, module_handle)?;
            contents.object_classes.insert(handle);
        }
        Ok(())
    }

    fn insert_dimension(
        &mut self,
        decl: &DimensionDecl,
        module_handle: ModuleHandle,
    ) -> Result<DimensionHandle, InconsistentFddError> {
        if let Some(&handle) = self.dimensions_by_name.get(&decl.name) {
            let dim = &mut self.dimensions[handle];
            if dim.upper_bound != decl.upper_bound {
                return Err(InconsistentFddError::DimensionBoundMismatch {
                    name: decl.name.clone(),
                });
            }
            dim.referring_modules.insert(module_handle);
            Ok(handle)
        } else {
            let handle = self.dimensions.insert(Dimension {
                name: decl.name.clone(),
                upper_bound: decl.upper_bound,
                referring_modules: BTreeSet::from([module_handle]),
            });
            self.dimensions_by_name.insert(decl.name.clone(), handle);
            Ok(handle)
        }
    }

    fn insert_update_rate(
        &mut self,
        decl: &UpdateRateDecl,
        module_handle: ModuleHandle,
    ) -> Result<UpdateRateHandle, InconsistentFddError> {
        if let Some(&handle) = self.update_rates_by_name.get(&decl.name) {
            let rate = &mut self.update_rates[handle];
            if rate.rate != decl.rate {
                return Err(InconsistentFddError::UpdateRateMismatch {
                    name: decl.name.clone(),
                });
            }
            rate.referring_modules.insert(module_handle);
            Ok(handle)
        } else {
            let handle = self.update_rates.insert(UpdateRate {
                name: decl.name.clone(),
                rate: decl.rate,
                referring_modules: BTreeSet::from([module_handle]),
            });
            self.update_rates_by_name.insert(decl.name.clone(), handle);
            Ok(handle)
        }
    }

    fn resolve_dimensions(
        &self,
        names: &[String],
    ) -> Result<BTreeSet<DimensionHandle>, InconsistentFddError> {
        names
            .iter()
            .map(|name| {
                self.dimensions_by_name
                    .get(name)
                    .copied()
                    .ok_or_else(|| InconsistentFddError::UnknownParent {
                        child: String::new(),
                        parent: name.clone(),
                    })
            })
            .collect()
    }

    /// Splits `"Root.Foo.Bar"` into `Some("Root.Foo")`.
    fn split_parent_path(&self, path: &str) -> Option<String> {
        path.rsplit_once('.').map(|(parent, _leaf)| parent.to_string())
    }

    fn insert_interaction_class(
        &mut self,
        decl: &InteractionClassDecl,
        module_handle: ModuleHandle,
    ) -> Result<InteractionClassHandle, InconsistentFddError> {
        let dims = self.resolve_dimensions(&decl.dimensions)?;

        if let Some(&handle) = self.interaction_classes_by_path.get(&decl.path) {
            let order_type: OrderType = decl.order_type.into();
            let transport_type: TransportType = decl.transport_type.into();
            let class = &self.interaction_classes[handle];
            if class.order_type != order_type
                || class.transport_type != transport_type
                || class.dimensions != dims
            {
                return Err(InconsistentFddError::InteractionClassMismatch {
                    path: decl.path.clone(),
                });
            }
            if let Some(params) = &decl.parameters {
                let existing: Vec<&str> = class
                    .own_parameters
                    .values()
                    .map(|p| p.name.as_str())
                    .collect();
                if existing != params.iter().map(|s| s.as_str()).collect::<Vec<_>>() {
                    return Err(InconsistentFddError::ParameterMismatch {
                        class: decl.path.clone(),
                        name: params.first().cloned().unwrap_or_default(),
                    });
                }
            }
            self.interaction_classes
                .get_mut(handle)
                .expect("looked up by path")
                .referring_modules
                .insert(module_handle);
            Ok(handle)
        } else {
            let parent_handle = self
                .split_parent_path(&decl.path)
                .map(|p| {
                    self.interaction_classes_by_path.get(&p).copied().ok_or(
                        InconsistentFddError::UnknownParent {
                            child: decl.path.clone(),
                            parent: p,
                        },
                    )
                })
                .transpose()?;

            let mut own_parameters = TinyMap::new();
            for name in decl.parameters.iter().flatten() {
                own_parameters.insert(FieldDef { name: name.clone() });
            }

            let handle = self
                .interaction_classes
                .insert_with_key(|handle| InteractionClassDef {
                    handle,
                    path: decl.path.clone(),
                    parent: parent_handle,
                    children: Vec::new(),
                    order_type: decl.order_type.into(),
                    transport_type: decl.transport_type.into(),
                    dimensions: dims,
                    own_parameters,
                    routing: ClassRouting::default(),
                    referring_modules: BTreeSet::from([module_handle]),
                });
            self.interaction_classes_by_path
                .insert(decl.path.clone(), handle);
            if let Some(parent_handle) = parent_handle {
                self.interaction_classes[parent_handle]
                    .children
                    .push(handle);
            }
            Ok(handle)
        }
    }

    fn insert_object_class(
        &mut self,
        decl: &ObjectClassDecl,
        module_handle: ModuleHandle,
    ) -> Result<ObjectClassHandle, InconsistentFddError> {
        let dims = self.resolve_dimensions(&decl.dimensions)?;

        if let Some(&handle) = self.object_classes_by_path.get(&decl.path) {
            let class = &self.object_classes[handle];
            if class.dimensions != dims {
                return Err(InconsistentFddError::ObjectClassMismatch {
                    path: decl.path.clone(),
                });
            }
            if let Some(attrs) = &decl.attributes {
                let existing: Vec<&str> = class
                    .own_attributes
                    .values()
                    .map(|a| a.name.as_str())
                    .collect();
                let wanted: Vec<&str> = attrs.iter().map(|a| a.name.as_str()).collect();
                if existing != wanted {
                    return Err(InconsistentFddError::AttributeMismatch {
                        class: decl.path.clone(),
                        name: wanted.first().map(|s| s.to_string()).unwrap_or_default(),
                    });
                }
            }
            self.object_classes
                .get_mut(handle)
                .expect("looked up by path")
                .referring_modules
                .insert(module_handle);
            Ok(handle)
        } else {
            let parent_handle = self
                .split_parent_path(&decl.path)
                .map(|p| {
                    self.object_classes_by_path.get(&p).copied().ok_or(
                        InconsistentFddError::UnknownParent {
                            child: decl.path.clone(),
                            parent: p,
                        },
                    )
                })
                .transpose()?;

            let mut own_attributes = TinyMap::new();
            if parent_handle.is_none() {
                own_attributes.insert(AttributeDef {
                    name: PRIVILEGE_TO_DELETE.to_string(),
                    order_type: OrderType::Receive,
                    transport_type: TransportType::Reliable,
                    routing: ClassRouting::default(),
                });
            }
            for attr in decl.attributes.iter().flatten() {
                own_attributes.insert(AttributeDef {
                    name: attr.name.clone(),
                    order_type: attr.order_type.into(),
                    transport_type: attr.transport_type.into(),
                    routing: ClassRouting::default(),
                });
            }

            let handle = self.object_classes.insert_with_key(|handle| ObjectClassDef {
                handle,
                path: decl.path.clone(),
                parent: parent_handle,
                children: Vec::new(),
                dimensions: dims,
                own_attributes,
                referring_modules: BTreeSet::from([module_handle]),
            });
            self.object_classes_by_path.insert(decl.path.clone(), handle);
            if let Some(parent_handle) = parent_handle {
                self.object_classes[parent_handle].children.push(handle);
            }
            Ok(handle)
        }
    }

    /// Rolls back the elements a failed [`ObjectModel::insert`] call itself created, i.e. exactly
    /// the contents recorded in `contents` so far (spec §4.2: "roll back the K accepted ones").
    fn rollback(&mut self, module_handle: ModuleHandle, contents: ModuleContents) {
        for handle in contents.dimensions {
            let dim = &mut self.dimensions[handle];
            dim.referring_modules.remove(&module_handle);
            if dim.referring_modules.is_empty() {
                let name = dim.name.clone();
                self.dimensions_by_name.remove(&name);
                self.dimensions.remove(handle);
            }
        }
        for handle in contents.update_rates {
            let rate = &mut self.update_rates[handle];
            rate.referring_modules.remove(&module_handle);
            if rate.referring_modules.is_empty() {
                let name = rate.name.clone();
                self.update_rates_by_name.remove(&name);
                self.update_rates.remove(handle);
            }
        }
        for handle in contents.interaction_classes {
            let class = &mut self.interaction_classes[handle];
            class.referring_modules.remove(&module_handle);
            if class.referring_modules.is_empty() {
                let path = class.path.clone();
                self.interaction_classes_by_path.remove(&path);
                self.interaction_classes.remove(handle);
            }
        }
        for handle in contents.object_classes {
            let class = &mut self.object_classes[handle];
            class.referring_modules.remove(&module_handle);
            if class.referring_modules.is_empty() {
                let path = class.path.clone();
                self.object_classes_by_path.remove(&path);
                self.object_classes.remove(handle);
            }
        }
    }

    /// The effective (inherited + own) parameter list of an interaction class, outermost-ancestor
    /// first (spec §3.2: "Children inherit parameters").
    pub fn effective_parameters(&self, handle: InteractionClassHandle) -> Vec<(ParameterHandle, &FieldDef)> {
        let mut chain = Vec::new();
        let mut cur = Some(handle);
        while let Some(h) = cur {
            chain.push(h);
            cur = self.interaction_classes[h].parent;
        }
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|h| self.interaction_classes[h].own_parameters.iter())
            .collect()
    }

    /// The effective (inherited + own) attribute list of an object class, outermost-ancestor
    /// first (spec §3.2: "Children inherit attributes").
    pub fn effective_attributes(&self, handle: ObjectClassHandle) -> Vec<(AttributeHandle, &AttributeDef)> {
        let mut chain = Vec::new();
        let mut cur = Some(handle);
        while let Some(h) = cur {
            chain.push(h);
            cur = self.object_classes[h].parent;
        }
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|h| self.object_classes[h].own_attributes.iter())
            .collect()
    }

    /// All descendants of `handle` (not including itself), for cumulative-subscription
    /// computation (spec §3.5).
    pub fn object_class_descendants(&self, handle: ObjectClassHandle) -> Vec<ObjectClassHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<_> = self.object_classes[handle].children.clone();
        while let Some(h) = stack.pop() {
            out.push(h);
            stack.extend(self.object_classes[h].children.iter().copied());
        }
        out
    }

    pub fn interaction_class_descendants(
        &self,
        handle: InteractionClassHandle,
    ) -> Vec<InteractionClassHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<_> = self.interaction_classes[handle].children.clone();
        while let Some(h) = stack.pop() {
            out.push(h);
            stack.extend(self.interaction_classes[h].children.iter().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_object_class(path: &str, attrs: &[&str]) -> ObjectClassDecl {
        ObjectClassDecl {
            path: path.to_string(),
            dimensions: Vec::new(),
            attributes: Some(
                attrs
                    .iter()
                    .map(|a| AttributeDecl {
                        name: a.to_string(),
                        order_type: OrderTypeDecl::Receive,
                        transport_type: TransportTypeDecl::Reliable,
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn first_attribute_is_privilege_to_delete() {
        let mut model = ObjectModel::new();
        model
            .insert(ModuleDescription {
                object_classes: vec![simple_object_class("Foo", &["X"])],
                ..Default::default()
            })
            .unwrap();
        let handle = model.object_classes_by_path["Foo"];
        let attrs = model.effective_attributes(handle);
        assert_eq!(attrs[0].1.name, PRIVILEGE_TO_DELETE);
        assert_eq!(attrs[1].1.name, "X");
    }

    #[test]
    fn child_inherits_parent_attributes() {
        let mut model = ObjectModel::new();
        model
            .insert(ModuleDescription {
                object_classes: vec![
                    simple_object_class("Root", &["A"]),
                    simple_object_class("Root.Child", &["B"]),
                ],
                ..Default::default()
            })
            .unwrap();
        let child = model.object_classes_by_path["Root.Child"];
        let names: Vec<_> = model
            .effective_attributes(child)
            .into_iter()
            .map(|(_, a)| a.name.clone())
            .collect();
        assert_eq!(names, vec![PRIVILEGE_TO_DELETE, "A", "B"]);
    }

    #[test]
    fn redeclaring_with_mismatched_shape_is_rejected_and_rolled_back() {
        let mut model = ObjectModel::new();
        model
            .insert(ModuleDescription {
                object_classes: vec![simple_object_class("Foo", &["X"])],
                ..Default::default()
            })
            .unwrap();

        let err = model.insert(ModuleDescription {
            dimensions: vec![DimensionDecl {
                name: "D".to_string(),
                upper_bound: 1,
            }],
            object_classes: vec![simple_object_class("Foo", &["Y"])],
            ..Default::default()
        });
        assert!(err.is_err());
        // The dimension inserted earlier in the same failed module must be rolled back too.
        assert!(!model.dimensions_by_name.contains_key("D"));
    }

    #[test]
    fn matching_redeclaration_adds_a_referent_without_duplicating_the_class() {
        let mut model = ObjectModel::new();
        let m1 = model
            .insert(ModuleDescription {
                object_classes: vec![simple_object_class("Foo", &["X"])],
                ..Default::default()
            })
            .unwrap();
        model
            .insert(ModuleDescription {
                object_classes: vec![ObjectClassDecl {
                    path: "Foo".to_string(),
                    dimensions: Vec::new(),
                    attributes: None,
                }],
                ..Default::default()
            })
            .unwrap();

        let handle = model.object_classes_by_path["Foo"];
        let class = &model.object_classes[handle];
        assert_eq!(class.referring_modules.len(), 2);
        assert!(class.referring_modules.contains(&m1));
    }
}
