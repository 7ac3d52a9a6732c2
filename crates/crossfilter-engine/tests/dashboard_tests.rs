mod common;

use common::{key, number, raw};
use crossfilter_engine::{
    reduce_sum, Chart, Count, Crossfilter, Dashboard, EngineError, SeriesPoint, WidgetData,
    WidgetSnapshot,
};
use crossfilter_store::{FieldSchema, FieldType, Record, Schema, Value};
use pretty_assertions::assert_eq;

fn asylum() -> Crossfilter<Record> {
    let schema = Schema::new(vec![
        FieldSchema::new("origin", FieldType::Text),
        FieldSchema::new("sex", FieldType::Text),
        FieldSchema::new("resolution", FieldType::Text),
        FieldSchema::new("total", FieldType::Integer),
    ])
    .unwrap();
    Crossfilter::load(
        schema,
        vec![
            raw(&[("origin", "Syria"), ("sex", "M"), ("resolution", "accepted"), ("total", "30")]),
            raw(&[("origin", "Syria"), ("sex", "F"), ("resolution", "rejected"), ("total", "10")]),
            raw(&[("origin", "Iraq"), ("sex", "M"), ("resolution", "rejected"), ("total", "20")]),
            raw(&[("origin", "Mali"), ("sex", "F"), ("resolution", "accepted"), ("total", "40")]),
        ],
    )
    .unwrap()
}

fn point(label: &str, value: f64, share: f64) -> SeriesPoint {
    SeriesPoint {
        label: label.to_string(),
        value,
        share,
    }
}

#[test]
fn snapshot_pulls_current_values_for_every_widget() {
    let mut cf = asylum();
    let origin = cf.dimension(|r: &Record| key(r, "origin"));
    let resolution = cf.dimension(|r: &Record| key(r, "resolution"));
    let sex = cf.dimension(|r: &Record| key(r, "sex"));

    let total = cf.group_all(reduce_sum(|r: &Record| number(r, "total")));
    let accepted = cf.group_all(reduce_sum(|r: &Record| {
        if r.text("resolution") == Some("accepted") {
            number(r, "total")
        } else {
            0.0
        }
    }));
    let by_origin = cf
        .group(&origin, reduce_sum(|r: &Record| number(r, "total")))
        .unwrap();

    let mut dashboard: Dashboard<Record> = Dashboard::new();
    dashboard.number_display("total", &total, |v| v.value()).unwrap();
    dashboard
        .share_display("accepted", &accepted, &total, |v| v.value())
        .unwrap();
    dashboard
        .chart("origin", Chart::new(by_origin, |v| v.value()))
        .unwrap();
    assert_eq!(dashboard.len(), 3);
    assert_eq!(
        dashboard.widget_ids().collect::<Vec<_>>(),
        vec!["total", "accepted", "origin"]
    );

    let snapshot = dashboard.snapshot(&cf).unwrap();
    assert_eq!(
        snapshot,
        vec![
            WidgetSnapshot {
                id: "total".to_string(),
                data: WidgetData::Number(100.0),
            },
            WidgetSnapshot {
                id: "accepted".to_string(),
                data: WidgetData::Share {
                    value: 70.0,
                    share: 0.7,
                },
            },
            WidgetSnapshot {
                id: "origin".to_string(),
                data: WidgetData::Series(vec![
                    point("Iraq", 20.0, 0.2),
                    point("Mali", 40.0, 0.4),
                    point("Syria", 40.0, 0.4),
                ]),
            },
        ]
    );

    cf.filter_exact(&sex, Value::from("M")).unwrap();
    cf.filter_exact(&resolution, Value::from("rejected")).unwrap();
    let snapshot = dashboard.snapshot(&cf).unwrap();
    assert_eq!(snapshot[0].data, WidgetData::Number(20.0));
    assert_eq!(
        snapshot[1].data,
        WidgetData::Share {
            value: 0.0,
            share: 0.0,
        }
    );
    assert_eq!(
        snapshot[2].data,
        WidgetData::Series(vec![
            point("Iraq", 20.0, 1.0),
            point("Mali", 0.0, 0.0),
            point("Syria", 0.0, 0.0),
        ])
    );

    dashboard.reset(&mut cf);
    assert_eq!(
        dashboard.snapshot(&cf).unwrap()[0].data,
        WidgetData::Number(100.0)
    );
}

#[test]
fn limited_chart_renders_the_largest_entries() {
    let mut cf = asylum();
    let origin = cf.dimension(|r: &Record| key(r, "origin"));
    let by_origin = cf.group(&origin, Count).unwrap();

    let mut dashboard: Dashboard<Record> = Dashboard::new();
    dashboard
        .chart("top-origin", Chart::new(by_origin, |n| *n as f64).limit(1))
        .unwrap();

    let snapshot = dashboard.snapshot(&cf).unwrap();
    assert_eq!(
        snapshot[0].data,
        WidgetData::Series(vec![point("Syria", 2.0, 0.5)])
    );
}

#[test]
fn duplicate_widget_ids_are_rejected() {
    let mut cf = asylum();
    let count = cf.group_all(Count);

    let mut dashboard: Dashboard<Record> = Dashboard::new();
    dashboard
        .number_display("records", &count, |n| *n as f64)
        .unwrap();
    let err = dashboard
        .number_display("records", &count, |n| *n as f64)
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateWidget(ref id) if id == "records"));
    assert_eq!(dashboard.len(), 1);
}

#[test]
fn widgets_bound_to_another_engine_fail_on_snapshot() {
    let mut a = asylum();
    let b = asylum();
    let count = a.group_all(Count);

    let mut dashboard: Dashboard<Record> = Dashboard::new();
    dashboard.number_display("records", &count, |n| *n as f64).unwrap();

    assert!(dashboard.snapshot(&a).is_ok());
    assert!(matches!(
        dashboard.snapshot(&b),
        Err(EngineError::UnknownGroup(0))
    ));
}
