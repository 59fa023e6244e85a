//! 需求元素
//!
//! 车辆、行人、集装箱及其类型、路线和流量。内嵌路线与行程步骤（停靠、步行、
//! 乘车……）是从属实体，由所属需求元素拥有，标识符由所属元素推导。

use super::additional::slave_id;
use crate::attribute::{Attr, AttributeError};
use crate::carrier::{AttributeCarrier, CarrierCore};
use crate::catalog::TypeCatalog;
use crate::entity::EntityKey;
use crate::hierarchy::{HierarchicalElement, Hierarchy};
use crate::tag::{Category, Tag};

/// 内嵌路线标识符 `<所属>_route`
pub fn embedded_route_id(owner: &str) -> String {
    format!("{}_route", owner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mover {
    Vehicle,
    Person,
    Container,
}

fn mover_of(tag: Tag) -> Option<Mover> {
    match tag {
        Tag::Vehicle
        | Tag::Trip
        | Tag::VehicleWithRoute
        | Tag::Flow
        | Tag::FlowRoute
        | Tag::FlowWithRoute => Some(Mover::Vehicle),
        Tag::Person | Tag::PersonFlow => Some(Mover::Person),
        Tag::Container | Tag::ContainerFlow => Some(Mover::Container),
        _ => None,
    }
}

fn step_allowed(mover: Mover, step: Tag) -> bool {
    matches!(
        (mover, step),
        (Mover::Vehicle, Tag::Stop)
            | (Mover::Person, Tag::PersonTrip | Tag::Walk | Tag::Ride | Tag::StopPerson)
            | (
                Mover::Container,
                Tag::Transport | Tag::Tranship | Tag::StopContainer
            )
    )
}

/// 内嵌路线
#[derive(Debug, Clone)]
pub struct EmbeddedRoute {
    core: CarrierCore,
}

impl EmbeddedRoute {
    pub fn edges(&self) -> Vec<String> {
        self.core.ids(Attr::Edges)
    }
}

impl AttributeCarrier for EmbeddedRoute {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

/// 行程步骤
#[derive(Debug, Clone)]
pub struct PlanStep {
    core: CarrierCore,
}

impl PlanStep {
    /// 步骤经过的路段
    pub fn edges(&self) -> Vec<String> {
        let edges = self.core.ids(Attr::Edges);
        if !edges.is_empty() {
            return edges;
        }
        let mut edges = self.core.ids(Attr::From);
        edges.extend(self.core.ids(Attr::To));
        edges
    }
}

impl AttributeCarrier for PlanStep {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

/// 需求元素
#[derive(Debug, Clone)]
pub struct DemandElement {
    core: CarrierCore,
    hierarchy: Hierarchy,
    embedded_route: Option<Box<EmbeddedRoute>>,
    plan: Vec<PlanStep>,
}

impl DemandElement {
    pub fn new(
        catalog: &TypeCatalog,
        tag: Tag,
        id: impl Into<String>,
    ) -> Result<Self, AttributeError> {
        let props = catalog.lookup(tag)?;
        if props.category() != Category::Demand || props.is_slave() {
            return Err(AttributeError::UnsupportedOperation {
                tag,
                reason: "not a top-level demand element".to_string(),
            });
        }
        Ok(Self {
            core: CarrierCore::new(catalog, tag, id)?,
            hierarchy: Hierarchy::new(),
            embedded_route: None,
            plan: Vec::new(),
        })
    }

    pub fn vehicle_type(catalog: &TypeCatalog, id: impl Into<String>) -> Result<Self, AttributeError> {
        Self::new(catalog, Tag::VType, id)
    }

    pub fn route(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        edges: &[&str],
    ) -> Result<Self, AttributeError> {
        Self::new(catalog, Tag::Route, id)?.with_edges(catalog, edges)
    }

    /// 沿已有路线行驶的车辆
    pub fn vehicle(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        vtype: &str,
        route: &str,
    ) -> Result<Self, AttributeError> {
        Self::new(catalog, Tag::Vehicle, id)?
            .with_type(vtype)?
            .with_route(route)
    }

    pub fn trip(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        vtype: &str,
        from: &str,
        to: &str,
    ) -> Result<Self, AttributeError> {
        Self::new(catalog, Tag::Trip, id)?
            .with_type(vtype)?
            .with_from_to(from, to)
    }

    /// 带内嵌路线的车辆
    pub fn vehicle_with_route(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        vtype: &str,
        edges: &[&str],
    ) -> Result<Self, AttributeError> {
        Self::new(catalog, Tag::VehicleWithRoute, id)?
            .with_type(vtype)?
            .with_edges(catalog, edges)
    }

    /// 引用车辆/行人类型
    pub fn with_type(mut self, type_id: &str) -> Result<Self, AttributeError> {
        self.require(Attr::Type)?;
        let type_tag = match mover_of(self.tag()) {
            Some(Mover::Person) => Tag::PType,
            _ => Tag::VType,
        };
        self.core.set_raw(Attr::Type, type_id);
        self.hierarchy.add_parent(EntityKey::new(type_tag, type_id));
        Ok(self)
    }

    pub fn with_route(mut self, route: &str) -> Result<Self, AttributeError> {
        self.require(Attr::Route)?;
        self.core.set_raw(Attr::Route, route);
        self.hierarchy.add_parent(EntityKey::new(Tag::Route, route));
        Ok(self)
    }

    pub fn with_from_to(mut self, from: &str, to: &str) -> Result<Self, AttributeError> {
        self.require(Attr::From)?;
        self.core.set_raw(Attr::From, from);
        self.core.set_raw(Attr::To, to);
        self.hierarchy.add_parent(EntityKey::new(Tag::Edge, from));
        self.hierarchy.add_parent(EntityKey::new(Tag::Edge, to));
        Ok(self)
    }

    /// 设置路段序列：路线直接写入，带内嵌路线的元素写入其内嵌路线
    pub fn with_edges(mut self, catalog: &TypeCatalog, edges: &[&str]) -> Result<Self, AttributeError> {
        let joined = edges.join(" ");
        if self.tag_properties().has_attribute(Attr::Edges) {
            self.core.set_raw(Attr::Edges, joined);
        } else if self.tag_properties().has_embedded_route() {
            let mut core = CarrierCore::new(
                catalog,
                Tag::RouteEmbedded,
                embedded_route_id(self.core.id()),
            )?;
            core.set_raw(Attr::Edges, joined);
            self.embedded_route = Some(Box::new(EmbeddedRoute { core }));
        } else {
            return Err(AttributeError::UnsupportedAttribute {
                tag: self.tag(),
                attr: Attr::Edges,
            });
        }
        for edge in edges {
            self.hierarchy.add_parent(EntityKey::new(Tag::Edge, *edge));
        }
        Ok(self)
    }

    pub fn with_attribute(mut self, attr: Attr, value: &str) -> Result<Self, AttributeError> {
        self.core.set(attr, value)?;
        Ok(self)
    }

    fn require(&self, attr: Attr) -> Result<(), AttributeError> {
        if self.tag_properties().has_attribute(attr) {
            Ok(())
        } else {
            Err(AttributeError::UnsupportedAttribute {
                tag: self.tag(),
                attr,
            })
        }
    }

    fn push_step(&mut self, catalog: &TypeCatalog, step: Tag) -> Result<usize, AttributeError> {
        let allowed = mover_of(self.tag()).is_some_and(|m| step_allowed(m, step));
        if !allowed {
            return Err(AttributeError::UnsupportedOperation {
                tag: self.tag(),
                reason: format!("cannot contain {} steps", step),
            });
        }
        let id = slave_id(self.core.id(), step, self.plan.len());
        self.plan.push(PlanStep {
            core: CarrierCore::new(catalog, step, id)?,
        });
        Ok(self.plan.len() - 1)
    }

    /// 在停靠设施处停靠
    pub fn add_stop(
        &mut self,
        catalog: &TypeCatalog,
        place: EntityKey,
    ) -> Result<&mut PlanStep, AttributeError> {
        let step = match mover_of(self.tag()) {
            Some(Mover::Person) => Tag::StopPerson,
            Some(Mover::Container) => Tag::StopContainer,
            _ => Tag::Stop,
        };
        let index = self.push_step(catalog, step)?;
        self.plan[index].core.set_raw(Attr::StoppingPlace, place.id.as_str());
        self.hierarchy.add_parent(place);
        Ok(&mut self.plan[index])
    }

    /// 沿路段序列步行（集装箱为转运）
    pub fn add_walk(
        &mut self,
        catalog: &TypeCatalog,
        edges: &[&str],
    ) -> Result<&mut PlanStep, AttributeError> {
        let step = match mover_of(self.tag()) {
            Some(Mover::Container) => Tag::Tranship,
            _ => Tag::Walk,
        };
        let index = self.push_step(catalog, step)?;
        self.plan[index].core.set_raw(Attr::Edges, edges.join(" "));
        for edge in edges {
            self.hierarchy.add_parent(EntityKey::new(Tag::Edge, *edge));
        }
        Ok(&mut self.plan[index])
    }

    /// 起终点行程（出行、乘车、运输）
    pub fn add_leg(
        &mut self,
        catalog: &TypeCatalog,
        step: Tag,
        from: &str,
        to: &str,
    ) -> Result<&mut PlanStep, AttributeError> {
        if !matches!(step, Tag::PersonTrip | Tag::Ride | Tag::Transport) {
            return Err(AttributeError::UnsupportedOperation {
                tag: step,
                reason: "not a from/to plan step".to_string(),
            });
        }
        let index = self.push_step(catalog, step)?;
        let core = &mut self.plan[index].core;
        core.set_raw(Attr::From, from);
        core.set_raw(Attr::To, to);
        self.hierarchy.add_parent(EntityKey::new(Tag::Edge, from));
        self.hierarchy.add_parent(EntityKey::new(Tag::Edge, to));
        Ok(&mut self.plan[index])
    }

    pub fn embedded_route(&self) -> Option<&EmbeddedRoute> {
        self.embedded_route.as_deref()
    }

    pub fn embedded_route_mut(&mut self) -> Option<&mut EmbeddedRoute> {
        self.embedded_route.as_deref_mut()
    }

    pub fn plan(&self) -> &[PlanStep] {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut [PlanStep] {
        &mut self.plan
    }

    /// 元素经过的路段序列
    pub fn path_links(&self) -> Vec<String> {
        let mut links = match &self.embedded_route {
            Some(route) => route.edges(),
            None => {
                let edges = self.core.ids(Attr::Edges);
                if edges.is_empty() {
                    let mut ends = self.core.ids(Attr::From);
                    ends.extend(self.core.ids(Attr::To));
                    ends
                } else {
                    edges
                }
            }
        };
        for step in &self.plan {
            links.extend(step.edges());
        }
        links.dedup();
        links
    }

    pub(crate) fn rename(&mut self, new_id: &str) {
        self.core.set_id(new_id);
        if let Some(route) = &mut self.embedded_route {
            route.core.set_id(embedded_route_id(new_id));
        }
        for (i, step) in self.plan.iter_mut().enumerate() {
            let tag = step.tag();
            step.core.set_id(slave_id(new_id, tag, i));
        }
    }

    pub(crate) fn reset_wiring(&mut self) {
        self.hierarchy.clear_children();
    }
}

impl AttributeCarrier for DemandElement {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

impl HierarchicalElement for DemandElement {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }

    fn replace_parent(&mut self, old: &EntityKey, new: &EntityKey) {
        if !self.hierarchy.replace_parent(old, new) {
            return;
        }
        self.core.rewrite_references(old, new);
        if let Some(route) = &mut self.embedded_route {
            route.core.rewrite_references(old, new);
        }
        for step in &mut self.plan {
            step.core.rewrite_references(old, new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_parents() {
        let catalog = TypeCatalog::standard();
        let v = DemandElement::vehicle(&catalog, "v0", "car", "r0").unwrap();
        assert_eq!(
            v.parents(),
            &[EntityKey::new(Tag::VType, "car"), EntityKey::new(Tag::Route, "r0")]
        );
        assert!(DemandElement::new(&catalog, Tag::Stop, "s").is_err());
    }

    #[test]
    fn test_embedded_route_follows_rename() {
        let catalog = TypeCatalog::standard();
        let mut v =
            DemandElement::vehicle_with_route(&catalog, "v0", "car", &["AB", "BC"]).unwrap();
        assert_eq!(v.embedded_route().unwrap().id(), "v0_route");
        assert_eq!(v.path_links(), ["AB", "BC"]);

        v.rename("v1");
        assert_eq!(v.embedded_route().unwrap().id(), "v1_route");

        let old = EntityKey::new(Tag::Edge, "AB");
        v.replace_parent(&old, &old.with_id("L1"));
        assert_eq!(v.embedded_route().unwrap().edges(), ["L1", "BC"]);
    }

    #[test]
    fn test_person_plan() {
        let catalog = TypeCatalog::standard();
        let mut p = DemandElement::new(&catalog, Tag::Person, "p0")
            .unwrap()
            .with_type("ped")
            .unwrap();
        assert_eq!(p.parents()[0], EntityKey::new(Tag::PType, "ped"));

        p.add_walk(&catalog, &["AB", "BC"]).unwrap();
        p.add_leg(&catalog, Tag::Ride, "BC", "CD").unwrap();
        p.add_stop(&catalog, EntityKey::new(Tag::BusStop, "stop1")).unwrap();
        assert!(p.add_leg(&catalog, Tag::Transport, "AB", "BC").is_err());

        assert_eq!(p.plan()[0].tag(), Tag::Walk);
        assert_eq!(p.plan()[2].tag(), Tag::StopPerson);
        assert_eq!(p.plan()[1].id(), "p0_ride1");
        assert_eq!(p.path_links(), ["AB", "BC", "CD"]);
    }

    #[test]
    fn test_route_has_no_embedded_route() {
        let catalog = TypeCatalog::standard();
        let r = DemandElement::route(&catalog, "r0", &["AB"]).unwrap();
        assert!(r.embedded_route().is_none());
        assert_eq!(r.get_attribute(Attr::Edges).unwrap(), "AB");
        assert!(DemandElement::vehicle_type(&catalog, "car")
            .unwrap()
            .with_edges(&catalog, &["AB"])
            .is_err());
    }
}
