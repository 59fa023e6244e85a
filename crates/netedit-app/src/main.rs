//! NetEdit 命令行演示程序
//! 通过撤销列表构建示例网络，演示重命名、撤销与重做

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use netedit_core::prelude::*;
use netedit_core::registry::DEFAULT_VEHTYPE;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("启动 NetEdit");

    let options = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("无法读取配置文件 {}", path))?;
            EditorOptions::from_json_str(&json).context("配置文件格式错误")?
        }
        None => EditorOptions::default(),
    };

    let catalog = Arc::new(TypeCatalog::standard());
    let mut registry = EntityRegistry::with_options(Arc::clone(&catalog), &options)?;
    let mut history = UndoList::from_options(&options);

    create_demo_content(&catalog, &options, &mut registry, &mut history)?;
    log_counts(&registry);

    let rename = Change::Rename {
        key: EntityKey::new(Tag::Edge, "AB"),
        new_id: "L1".to_string(),
    };
    history.add(rename, &mut registry)?;
    info!("重命名后车道: {:?}", registry.ids_of(Tag::Lane));
    info!("重命名后连接: {:?}", registry.ids_of(Tag::Connection));

    info!("撤销: {}", history.undo(&mut registry)?);
    info!("撤销后车道: {:?}", registry.ids_of(Tag::Lane));
    info!("重做: {}", history.redo(&mut registry)?);

    registry.assert_coherent();
    info!("注册表一致性检查通过");

    let stats = history.stats();
    let summary = serde_json::json!({
        "entities": registry.len(),
        "junctions": registry.count(Tag::Junction),
        "edges": registry.count(Tag::Edge),
        "lanes": registry.count(Tag::Lane),
        "spatial_index": registry.spatial().len(),
        "network_requires_save": registry.requires_save(SaveGroup::Network),
        "total_operations": stats.total_operations,
        "undo_depth": stats.undo_depth,
        "redo_depth": stats.redo_depth,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// 创建示例网络：三个路口、两条路段、两个同名停靠站、一辆车和一组统计数据
fn create_demo_content(
    catalog: &TypeCatalog,
    options: &EditorOptions,
    registry: &mut EntityRegistry,
    history: &mut UndoList,
) -> Result<()> {
    history.begin("创建示例网络")?;

    for (id, x, y) in [("A", 0.0, 0.0), ("B", 200.0, 0.0), ("C", 200.0, 150.0)] {
        let node = Node::new(catalog, id, Point2::new(x, y))?;
        history.add(Change::Register(node.into()), registry)?;
    }

    let bc = Link::new(catalog, "BC", "B", "C", 1)?
        .with_geometry(&[Point2::new(200.0, 0.0), Point2::new(200.0, 150.0)]);
    history.add(Change::Register(bc.into()), registry)?;

    let mut ab = Link::new(catalog, "AB", "A", "B", 2)?
        .with_geometry(&[Point2::new(0.0, 0.0), Point2::new(200.0, 0.0)]);
    ab.add_connection(catalog, 1, "BC", 0)?;
    history.add(Change::Register(ab.into()), registry)?;

    // 不同分区中可以使用相同的标识符
    let bus_stop = Additional::new(catalog, Tag::BusStop, "stop1")?
        .on_lane("AB", 0)?
        .with_attribute(Attr::Lines, "42")?;
    history.add(Change::Register(bus_stop.into()), registry)?;
    let container_stop = Additional::new(catalog, Tag::ContainerStop, "stop1")?.on_lane("AB", 1)?;
    history.add(Change::Register(container_stop.into()), registry)?;

    let vtype = if options.default_vehicle_types {
        DEFAULT_VEHTYPE.to_string()
    } else {
        let car = DemandElement::vehicle_type(catalog, "car")?;
        history.add(Change::Register(car.into()), registry)?;
        "car".to_string()
    };
    let mut vehicle = DemandElement::vehicle_with_route(catalog, "veh0", &vtype, &["AB", "BC"])?;
    vehicle.add_stop(catalog, EntityKey::new(Tag::BusStop, "stop1"))?;
    history.add(Change::Register(vehicle.into()), registry)?;

    let mut counts = DataSet::new(catalog, "counts")?;
    counts
        .add_interval(catalog, 0.0, 3600.0)?
        .add_edge_data(catalog, "AB")?
        .set_param("entered", 120.0);
    history.add(Change::Register(counts.into()), registry)?;

    history.end()?;
    info!("示例网络已创建，共 {} 个实体", registry.len());
    Ok(())
}

fn log_counts(registry: &EntityRegistry) {
    for category in Category::ALL {
        let count: usize = registry
            .catalog()
            .tags_in(*category)
            .into_iter()
            .map(|tag| registry.count(tag))
            .sum();
        if count > 0 {
            info!("{:?}: {}", category, count);
        }
    }
    let records = registry.retrieve_generic_datas(Tag::EdgeData, 0.0, 3600.0);
    info!("时间窗口 [0, 3600] 内的路段数据: {}", records.len());
}
