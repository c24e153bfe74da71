//! Integration tests for the Quire fill pipeline.
//!
//! These tests run whole reports through [`ReportFiller`] and check where
//! things end up. They verify:
//! - every row is printed exactly once across breaks
//! - split-prevented bands and keep-together groups move whole
//! - group footers land where their position asks
//! - header overflow and the page break loop guard surface as errors
//! - deferred elements see their final values
//! - the no-data policies produce the right document shape

use serde_json::{json, Value};

use quire::calc::RecordCalculator;
use quire::data::{JsonRows, Row};
use quire::error::{HeaderKind, QuireError};
use quire::model::*;
use quire::print::{BandKind, Page, PrintElement};
use quire::scriptlet::{NoopScriptlet, Scriptlet};
use quire::sink::ParentSink;
use quire::{CancelToken, FillOptions, ReportFiller, SubreportContext};

// ─── Helpers ────────────────────────────────────────────────────

/// 200×200 page with 10pt margins: 180pt of printable height.
fn square_page() -> PageConfig {
    PageConfig {
        size: PageSize::Custom {
            width: 200.0,
            height: 200.0,
        },
        margin: Edges::uniform(10.0),
    }
}

fn report_with_detail(detail: Band) -> Report {
    Report {
        name: "test".to_string(),
        page: square_page(),
        detail: Section::new(vec![detail]),
        ..Default::default()
    }
}

fn field_band(height: f64, field: &str) -> Band {
    Band::text(height, 80.0, Expression::field(field))
}

fn id_band() -> Band {
    field_band(20.0, "id")
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("not a row: {other}"),
    }
}

fn numbered_rows(n: usize) -> Vec<Row> {
    (0..n).map(|i| row(json!({ "id": i }))).collect()
}

fn grouped_rows(keys: &[&str]) -> Vec<Row> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| row(json!({ "g": k, "id": format!("{k}{i}") })))
        .collect()
}

fn fill(report: Report, rows: Vec<Row>) -> Vec<Page> {
    let _ = env_logger::try_init();
    quire::fill(report, rows).unwrap()
}

fn of<'a>(page: &'a Page, band: &BandKind) -> Vec<&'a PrintElement> {
    page.elements_of(band).collect()
}

fn texts(pages: &[Page], band: &BandKind) -> Vec<String> {
    pages
        .iter()
        .flat_map(|p| p.elements_of(band))
        .filter_map(|e| e.text())
        .collect()
}

fn group(name: &str) -> Group {
    Group::new(name, Expression::field(name))
}

fn footer_band(label: &str, field: &str) -> Band {
    Band::text(
        20.0,
        80.0,
        Expression::concat(vec![Expression::literal(label), Expression::field(field)]),
    )
}

// ─── Flow Tests ─────────────────────────────────────────────────

#[test]
fn every_row_is_printed_once_across_pages() {
    let mut report = report_with_detail(id_band());
    report.page_header = Some(Band::text(20.0, 100.0, Expression::literal("Header")));
    let pages = fill(report, numbered_rows(30));

    // 160pt under the header: 8 rows per page
    assert_eq!(pages.len(), 4);
    let ids: Vec<String> = (0..30).map(|i| i.to_string()).collect();
    assert_eq!(texts(&pages, &BandKind::Detail), ids);

    for page in &pages {
        assert_eq!(of(page, &BandKind::PageHeader).len(), 1);
        let details = of(page, &BandKind::Detail);
        for pair in details.windows(2) {
            assert!(pair[0].bottom() <= pair[1].y, "details overlap");
        }
        assert!(details.iter().all(|e| e.y >= 30.0 && e.bottom() <= 190.0));
    }
}

#[test]
fn page_footer_on_every_page_with_numbers() {
    let mut report = report_with_detail(id_band());
    report.page_footer = Some(Band::text(
        20.0,
        100.0,
        Expression::concat(vec![
            Expression::literal("Page "),
            Expression::variable("PAGE_NUMBER"),
        ]),
    ));
    let pages = fill(report, numbered_rows(20));

    // 160pt above the footer: 8 rows per page
    assert_eq!(pages.len(), 3);
    assert_eq!(
        texts(&pages, &BandKind::PageFooter),
        vec!["Page 1", "Page 2", "Page 3"]
    );
    for page in &pages {
        let footer = of(page, &BandKind::PageFooter);
        assert_eq!(footer[0].y, 170.0);
    }
    assert_eq!(
        pages.iter().map(|p| p.number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn last_page_footer_replaces_page_footer_on_final_page() {
    let mut report = report_with_detail(id_band());
    report.page_footer = Some(Band::text(20.0, 100.0, Expression::literal("more")));
    report.last_page_footer = Some(Band::text(20.0, 100.0, Expression::literal("end")));
    let pages = fill(report, numbered_rows(20));

    assert_eq!(pages.len(), 3);
    for page in &pages[..2] {
        assert_eq!(of(page, &BandKind::PageFooter).len(), 1);
        assert!(of(page, &BandKind::LastPageFooter).is_empty());
    }
    let last = &pages[2];
    assert!(of(last, &BandKind::PageFooter).is_empty());
    assert_eq!(of(last, &BandKind::LastPageFooter)[0].text().unwrap(), "end");
}

#[test]
fn stretching_band_splits_between_lines() {
    let mut rows = numbered_rows(7);
    rows.push(row(json!({ "id": "1\n2\n3\n4\n5" })));
    let pages = fill(report_with_detail(id_band()), rows);

    assert_eq!(pages.len(), 2);
    let first = of(&pages[0], &BandKind::Detail);
    assert_eq!(first.len(), 8);
    assert_eq!(first[7].text().unwrap(), "1\n2");
    assert_eq!(first[7].y, 150.0);

    let second = of(&pages[1], &BandKind::Detail);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].text().unwrap(), "3\n4\n5");
    assert_eq!(second[0].y, 10.0);
}

#[test]
fn split_prevented_band_moves_whole() {
    let mut rows = numbered_rows(7);
    rows.push(row(json!({ "id": "1\n2\n3\n4\n5" })));
    let report = report_with_detail(id_band().with_split_type(SplitType::Prevent));
    let pages = fill(report, rows);

    assert_eq!(pages.len(), 2);
    assert_eq!(of(&pages[0], &BandKind::Detail).len(), 7);
    let moved = of(&pages[1], &BandKind::Detail);
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].text().unwrap(), "1\n2\n3\n4\n5");
    assert_eq!(moved[0].y, 10.0);
    assert_eq!(moved[0].height, 100.0);
}

#[test]
fn print_when_skips_rows() {
    let detail = id_band().with_print_when(Expression::field("show"));
    let rows = vec![
        row(json!({ "id": 1, "show": true })),
        row(json!({ "id": 2, "show": false })),
        row(json!({ "id": 3, "show": true })),
    ];
    let pages = fill(report_with_detail(detail), rows);
    let details = of(&pages[0], &BandKind::Detail);
    assert_eq!(details.len(), 2);
    assert_eq!(details[1].y, 30.0);
}

#[test]
fn title_on_its_own_page() {
    let mut report = report_with_detail(id_band());
    report.title = Some(Band::text(30.0, 100.0, Expression::literal("Title")));
    report.title_new_page = true;
    let pages = fill(report, numbered_rows(2));

    assert_eq!(pages.len(), 2);
    assert_eq!(of(&pages[0], &BandKind::Title).len(), 1);
    assert!(of(&pages[0], &BandKind::Detail).is_empty());
    assert_eq!(of(&pages[1], &BandKind::Detail)[0].y, 10.0);
}

#[test]
fn summary_follows_content_and_counts_rows() {
    let mut report = report_with_detail(id_band());
    report.summary = Some(Band::text(
        20.0,
        100.0,
        Expression::concat(vec![
            Expression::literal("Rows: "),
            Expression::variable("REPORT_COUNT"),
        ]),
    ));
    let pages = fill(report, numbered_rows(3));

    assert_eq!(pages.len(), 1);
    let summary = of(&pages[0], &BandKind::Summary);
    assert_eq!(summary[0].text().unwrap(), "Rows: 3");
    assert_eq!(summary[0].y, 70.0);
}

#[test]
fn summary_new_page_opens_a_page() {
    let mut report = report_with_detail(id_band());
    report.summary = Some(Band::text(20.0, 100.0, Expression::literal("done")));
    report.summary_new_page = true;
    let pages = fill(report, numbered_rows(3));

    assert_eq!(pages.len(), 2);
    assert!(of(&pages[0], &BandKind::Summary).is_empty());
    assert_eq!(of(&pages[1], &BandKind::Summary)[0].y, 10.0);
}

// ─── Column Tests ───────────────────────────────────────────────

fn two_columns(direction: RunDirection) -> ColumnLayout {
    ColumnLayout {
        count: 2,
        width: None,
        spacing: 20.0,
        direction,
    }
}

#[test]
fn columns_fill_left_to_right() {
    let mut report = report_with_detail(id_band());
    report.columns = two_columns(RunDirection::Ltr);
    let pages = fill(report, numbered_rows(10));

    assert_eq!(pages.len(), 1);
    let details = of(&pages[0], &BandKind::Detail);
    assert_eq!((details[0].x, details[0].column), (10.0, Some(0)));
    assert_eq!((details[9].x, details[9].y), (110.0, 10.0));
    assert_eq!(details[9].column, Some(1));
}

#[test]
fn columns_fill_right_to_left() {
    let mut report = report_with_detail(id_band());
    report.columns = two_columns(RunDirection::Rtl);
    let pages = fill(report, numbered_rows(10));

    let details = of(&pages[0], &BandKind::Detail);
    assert_eq!(details[0].x, 110.0);
    assert_eq!(details[9].x, 10.0);
    assert_eq!(details[9].column, Some(1));
}

#[test]
fn column_footer_floats_after_content() {
    let mut report = report_with_detail(id_band());
    report.column_footer = Some(Band::text(20.0, 80.0, Expression::literal("cf")));

    let pages = fill(report.clone(), numbered_rows(3));
    assert_eq!(of(&pages[0], &BandKind::ColumnFooter)[0].y, 170.0);

    report.float_column_footer = true;
    let pages = fill(report, numbered_rows(3));
    assert_eq!(of(&pages[0], &BandKind::ColumnFooter)[0].y, 70.0);
}

// ─── Group Tests ────────────────────────────────────────────────

fn keep_together_report(keep_together: bool) -> Report {
    let mut g = group("g");
    g.header = Section::new(vec![field_band(20.0, "g")]);
    g.keep_together = keep_together;
    let mut report = report_with_detail(id_band());
    report.columns = two_columns(RunDirection::Ltr);
    report.groups = vec![g];
    report
}

const KEEP_ROWS: [&str; 9] = ["A", "A", "A", "A", "A", "A", "B", "B", "B"];

#[test]
fn keep_together_group_moves_to_next_column() {
    let pages = fill(keep_together_report(true), grouped_rows(&KEEP_ROWS));

    assert_eq!(pages.len(), 1);
    let headers = of(&pages[0], &BandKind::GroupHeader("g".to_string()));
    let b = headers.iter().find(|e| e.text().unwrap() == "B").unwrap();
    assert_eq!((b.x, b.y, b.column), (110.0, 10.0, Some(1)));

    let b6 = pages[0]
        .elements
        .iter()
        .find(|e| e.text().as_deref() == Some("B6"))
        .unwrap();
    assert_eq!((b6.y, b6.column), (30.0, Some(1)));
    assert!(pages[0]
        .elements
        .iter()
        .filter(|e| e.column == Some(0))
        .all(|e| !e.text().unwrap().starts_with('B')));
}

#[test]
fn group_without_keep_together_splits_across_columns() {
    let pages = fill(keep_together_report(false), grouped_rows(&KEEP_ROWS));

    let headers = of(&pages[0], &BandKind::GroupHeader("g".to_string()));
    let b = headers.iter().find(|e| e.text().unwrap() == "B").unwrap();
    assert_eq!((b.y, b.column), (150.0, Some(0)));
}

#[test]
fn group_footer_sums_with_previous_values() {
    let mut g = group("g");
    g.footer = Section::new(vec![Band::text(
        20.0,
        100.0,
        Expression::concat(vec![
            Expression::literal("Total "),
            Expression::variable("total"),
        ]),
    )]);
    let mut report = report_with_detail(id_band());
    report.groups = vec![g];
    report.variables = vec![VariableDef {
        name: "total".to_string(),
        expression: Expression::field("amount"),
        calculation: Calculation::Sum,
        reset: ResetType::Group("g".to_string()),
    }];
    let rows = vec![
        row(json!({ "g": "A", "id": 1, "amount": 10 })),
        row(json!({ "g": "A", "id": 2, "amount": 5 })),
        row(json!({ "g": "B", "id": 3, "amount": 7 })),
    ];
    let pages = fill(report, rows);
    assert_eq!(
        texts(&pages, &BandKind::GroupFooter("g".to_string())),
        vec!["Total 15", "Total 7"]
    );
}

#[test]
fn start_new_page_and_reset_page_number() {
    let mut g = group("g");
    g.header = Section::new(vec![field_band(20.0, "g")]);
    g.start_new_page = true;
    let mut report = report_with_detail(id_band());
    report.groups = vec![g];

    let pages = fill(report.clone(), grouped_rows(&["A", "B"]));
    assert_eq!(pages.len(), 2);
    assert_eq!((pages[0].number, pages[1].number), (1, 2));
    assert_eq!(of(&pages[1], &BandKind::GroupHeader("g".to_string()))[0].y, 10.0);

    report.groups[0].reset_page_number = true;
    let pages = fill(report, grouped_rows(&["A", "B"]));
    assert_eq!((pages[0].number, pages[1].number), (1, 1));
}

#[test]
fn reprinted_header_heads_each_page() {
    let mut g = group("g");
    g.header = Section::new(vec![field_band(20.0, "g")]);
    g.reprint_header_on_each_page = true;
    let mut report = report_with_detail(id_band());
    report.groups = vec![g];

    let keys = vec!["A"; 12];
    let pages = fill(report, grouped_rows(&keys));
    assert_eq!(pages.len(), 2);
    let reprint = of(&pages[1], &BandKind::GroupHeader("g".to_string()));
    assert_eq!(reprint.len(), 1);
    assert_eq!((reprint[0].y, reprint[0].text().unwrap()), (10.0, "A".to_string()));
    assert_eq!(of(&pages[1], &BandKind::Detail)[0].y, 30.0);
}

// ─── Footer Position Tests ──────────────────────────────────────

fn nested_footer_report(outer: FooterPosition, inner: FooterPosition) -> Report {
    let mut o = group("o");
    o.footer = Section::new(vec![footer_band("outer ", "o")]);
    o.footer_position = outer;
    let mut i = group("i");
    i.footer = Section::new(vec![footer_band("inner ", "i")]);
    i.footer_position = inner;
    let mut report = report_with_detail(id_band());
    report.groups = vec![o, i];
    report
}

fn nested_rows() -> Vec<Row> {
    vec![
        row(json!({ "o": 1, "i": 1, "id": "a" })),
        row(json!({ "o": 2, "i": 1, "id": "b" })),
    ]
}

fn first_footer<'a>(pages: &'a [Page], group: &str) -> (usize, &'a PrintElement) {
    let band = BandKind::GroupFooter(group.to_string());
    pages
        .iter()
        .enumerate()
        .find_map(|(n, p)| p.elements_of(&band).next().map(|e| (n, e)))
        .unwrap()
}

#[test]
fn normal_footers_follow_content() {
    let pages = fill(
        nested_footer_report(FooterPosition::Normal, FooterPosition::Normal),
        nested_rows(),
    );
    assert_eq!(first_footer(&pages, "i").1.y, 30.0);
    assert_eq!(first_footer(&pages, "o").1.y, 50.0);
    assert_eq!(of(&pages[0], &BandKind::Detail)[1].y, 70.0);
}

#[test]
fn stacked_footers_move_to_bottom_together() {
    let pages = fill(
        nested_footer_report(FooterPosition::StackAtBottom, FooterPosition::StackAtBottom),
        nested_rows(),
    );
    let (page_i, inner) = first_footer(&pages, "i");
    let (page_o, outer) = first_footer(&pages, "o");
    assert_eq!((page_i, page_o), (0, 0));
    assert_eq!((inner.y, outer.y), (150.0, 170.0));
    // The column is used up: the next row starts a page
    assert_eq!(of(&pages[1], &BandKind::Detail)[0].y, 10.0);
}

#[test]
fn forced_footers_move_independently() {
    let pages = fill(
        nested_footer_report(FooterPosition::ForceAtBottom, FooterPosition::ForceAtBottom),
        nested_rows(),
    );
    let (page_i, inner) = first_footer(&pages, "i");
    let (page_o, outer) = first_footer(&pages, "o");
    assert_eq!((page_i, inner.y), (0, 170.0));
    assert_eq!((page_o, outer.y), (1, 170.0));
}

#[test]
fn collated_footers_move_when_all_collate() {
    let pages = fill(
        nested_footer_report(FooterPosition::CollateAtBottom, FooterPosition::CollateAtBottom),
        nested_rows(),
    );
    assert_eq!(first_footer(&pages, "i").1.y, 150.0);
    assert_eq!(first_footer(&pages, "o").1.y, 170.0);
}

#[test]
fn normal_footer_cancels_collation() {
    let pages = fill(
        nested_footer_report(FooterPosition::Normal, FooterPosition::CollateAtBottom),
        nested_rows(),
    );
    assert_eq!(first_footer(&pages, "i").1.y, 30.0);
    assert_eq!(first_footer(&pages, "o").1.y, 50.0);
}

// ─── Deferred Element Tests ─────────────────────────────────────

#[test]
fn page_x_of_y() {
    let mut report = report_with_detail(id_band());
    report.page_footer = Some(
        Band::empty(20.0)
            .with_element(Element::text(
                0.0,
                0.0,
                60.0,
                20.0,
                Expression::concat(vec![
                    Expression::literal("Page "),
                    Expression::variable("PAGE_NUMBER"),
                    Expression::literal(" of "),
                ]),
            ))
            .with_element(
                Element::text(60.0, 0.0, 40.0, 20.0, Expression::variable("PAGE_NUMBER"))
                    .evaluated_at(EvaluationTime::Report),
            ),
    );
    let pages = fill(report, numbered_rows(20));

    assert_eq!(pages.len(), 3);
    for (n, page) in pages.iter().enumerate() {
        let footer: Vec<String> = page
            .elements_of(&BandKind::PageFooter)
            .filter_map(|e| e.text())
            .collect();
        assert_eq!(footer, vec![format!("Page {} of ", n + 1), "3".to_string()]);
    }
}

#[test]
fn band_time_element_on_background_is_resolved() {
    let mut report = report_with_detail(id_band());
    report.background = Some(Band::empty(20.0).with_element(
        Element::text(0.0, 0.0, 80.0, 20.0, Expression::variable("PAGE_NUMBER"))
            .evaluated_at(EvaluationTime::Band),
    ));
    let pages = fill(report, numbered_rows(12));

    assert_eq!(pages.len(), 2);
    for (n, page) in pages.iter().enumerate() {
        let background = of(page, &BandKind::Background);
        assert_eq!(background.len(), 1);
        assert_eq!(background[0].text().unwrap(), (n + 1).to_string());
    }
}

#[test]
fn group_time_element_shows_group_count() {
    let mut g = group("g");
    g.header = Section::new(vec![Band::empty(20.0).with_element(
        Element::text(0.0, 0.0, 80.0, 20.0, Expression::variable("g_COUNT"))
            .evaluated_at(EvaluationTime::Group("g".to_string())),
    )]);
    let mut report = report_with_detail(id_band());
    report.groups = vec![g];

    let pages = fill(report, grouped_rows(&["A", "A", "A", "B", "B"]));
    assert_eq!(
        texts(&pages, &BandKind::GroupHeader("g".to_string())),
        vec!["3", "2"]
    );
}

// ─── No Data Tests ──────────────────────────────────────────────

fn no_data_report(policy: WhenNoData) -> Report {
    let mut report = report_with_detail(id_band());
    report.title = Some(Band::text(30.0, 100.0, Expression::literal("Title")));
    report.summary = Some(Band::text(
        20.0,
        100.0,
        Expression::concat(vec![
            Expression::literal("Rows: "),
            Expression::variable("REPORT_COUNT"),
        ]),
    ));
    report.no_data = Some(Band::text(20.0, 100.0, Expression::literal("Nothing to show")));
    report.when_no_data = policy;
    report
}

#[test]
fn no_pages_without_data() {
    let pages = fill(no_data_report(WhenNoData::NoPages), Vec::new());
    assert!(pages.is_empty());
}

#[test]
fn blank_page_without_data() {
    let pages = fill(no_data_report(WhenNoData::BlankPage), Vec::new());
    assert_eq!(pages.len(), 1);
    assert!(pages[0].is_empty());
    assert_eq!(pages[0].number, 1);
}

#[test]
fn all_sections_without_detail() {
    let pages = fill(no_data_report(WhenNoData::AllSectionsNoDetail), Vec::new());
    assert_eq!(pages.len(), 1);
    assert!(of(&pages[0], &BandKind::Detail).is_empty());
    assert_eq!(of(&pages[0], &BandKind::Title).len(), 1);
    assert_eq!(
        of(&pages[0], &BandKind::Summary)[0].text().unwrap(),
        "Rows: 0"
    );
    assert!(of(&pages[0], &BandKind::NoData).is_empty());
}

#[test]
fn no_data_section_alone() {
    let pages = fill(no_data_report(WhenNoData::NoDataSection), Vec::new());
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].elements.len(), 1);
    assert_eq!(pages[0].elements[0].band, BandKind::NoData);
    assert_eq!(pages[0].elements[0].y, 10.0);
}

// ─── Error Tests ────────────────────────────────────────────────

fn many_lines(n: usize) -> String {
    (0..n).map(|i| i.to_string()).collect::<Vec<_>>().join("\n")
}

#[test]
fn page_header_taller_than_page_is_an_error() {
    let mut report = report_with_detail(id_band());
    report.page_header = Some(field_band(20.0, "notes"));
    let rows = vec![row(json!({ "id": 1, "notes": many_lines(20) }))];
    let result = quire::fill(report, rows);
    assert!(matches!(
        result,
        Err(QuireError::HeaderOverflow {
            header: HeaderKind::Page,
            attempts: 2
        })
    ));
}

#[test]
fn column_header_taller_than_column_is_an_error() {
    let mut report = report_with_detail(id_band());
    report.column_header = Some(field_band(20.0, "notes"));
    let rows = vec![row(json!({ "id": 1, "notes": many_lines(20) }))];
    let result = quire::fill(report, rows);
    assert!(matches!(
        result,
        Err(QuireError::HeaderOverflow {
            header: HeaderKind::Column,
            ..
        })
    ));
}

#[test]
fn unsplittable_band_taller_than_column_is_an_error() {
    let report = report_with_detail(Band::empty(300.0).with_split_type(SplitType::Prevent));
    let result = quire::fill(report, numbered_rows(1));
    match result {
        Err(QuireError::ColumnOverflow {
            break_height,
            available,
            ..
        }) => {
            assert_eq!(break_height, 300.0);
            assert_eq!(available, 180.0);
        }
        other => panic!("expected a column overflow, got {other:?}"),
    }
}

#[test]
fn overflowing_reprinted_header_is_an_infinite_loop() {
    let mut g = group("g");
    g.header = Section::new(vec![field_band(20.0, "notes")]);
    g.reprint_header_on_each_page = true;
    let mut report = report_with_detail(id_band());
    report.groups = vec![g];

    let rows = vec![row(json!({ "g": "A", "id": 1, "notes": many_lines(12) }))];
    assert!(matches!(
        quire::fill(report, rows),
        Err(QuireError::InfiniteLoopCreatingPage)
    ));
}

#[test]
fn invalid_geometry_is_rejected_up_front() {
    let mut report = report_with_detail(id_band());
    report.columns.count = 0;
    assert!(matches!(
        ReportFiller::new(report),
        Err(QuireError::InvalidReport(_))
    ));
}

// ─── Filler Lifecycle Tests ─────────────────────────────────────

#[derive(Default)]
struct Counting {
    report_init: usize,
    group_init: usize,
    detail: usize,
}

impl Scriptlet for Counting {
    fn before_report_init(&mut self) -> Result<(), QuireError> {
        self.report_init += 1;
        Ok(())
    }
    fn before_group_init(&mut self) -> Result<(), QuireError> {
        self.group_init += 1;
        Ok(())
    }
    fn before_detail_eval(&mut self) -> Result<(), QuireError> {
        self.detail += 1;
        Ok(())
    }
}

#[test]
fn scriptlet_hooks_fire_per_row() {
    let mut report = report_with_detail(id_band());
    report.groups = vec![group("g")];
    let filler = ReportFiller::new(report).unwrap();

    let mut scriptlet = Counting::default();
    let mut pages = Vec::new();
    let stats = filler
        .fill_report(
            &mut JsonRows::new(grouped_rows(&["A", "A", "B", "B", "C"])),
            &mut RecordCalculator::new(filler.report()),
            &mut scriptlet,
            &mut pages,
        )
        .unwrap();

    assert_eq!(stats.rows, 5);
    assert_eq!(stats.pages, pages.len());
    assert_eq!(scriptlet.report_init, 1);
    assert_eq!(scriptlet.detail, 5);
    // Group init runs for every row after the first, changed or not
    assert_eq!(scriptlet.group_init, 4);
}

struct Reentrant<'f> {
    filler: &'f ReportFiller,
    nested: Option<Result<Vec<Page>, QuireError>>,
}

impl Scriptlet for Reentrant<'_> {
    fn before_detail_eval(&mut self) -> Result<(), QuireError> {
        if self.nested.is_none() {
            self.nested = Some(self.filler.fill_rows(Vec::new()));
        }
        Ok(())
    }
}

#[test]
fn overlapping_fill_is_rejected() {
    let filler = ReportFiller::new(report_with_detail(id_band())).unwrap();
    let mut scriptlet = Reentrant {
        filler: &filler,
        nested: None,
    };
    let mut pages = Vec::new();
    filler
        .fill_report(
            &mut JsonRows::new(numbered_rows(2)),
            &mut RecordCalculator::new(filler.report()),
            &mut scriptlet,
            &mut pages,
        )
        .unwrap();

    assert!(matches!(
        scriptlet.nested,
        Some(Err(QuireError::FillInProgress))
    ));
    assert_eq!(pages.len(), 1);
    // The filler is free again once the fill returned
    assert!(filler.fill_rows(numbered_rows(1)).is_ok());
}

#[test]
fn cancelled_fill_delivers_nothing() {
    let token = CancelToken::new();
    token.cancel();
    let filler = ReportFiller::new(report_with_detail(id_band()))
        .unwrap()
        .with_options(FillOptions {
            id: "cancelled".to_string(),
            cancel: Some(token),
            ..Default::default()
        });

    let mut pages = Vec::new();
    let result = filler.fill_report(
        &mut JsonRows::new(numbered_rows(30)),
        &mut RecordCalculator::new(filler.report()),
        &mut NoopScriptlet,
        &mut pages,
    );
    assert!(matches!(result, Err(QuireError::Cancelled)));
    assert!(pages.is_empty());
}

#[test]
fn subreport_forwards_pages_to_parent() {
    let filler = ReportFiller::new(report_with_detail(id_band()))
        .unwrap()
        .with_options(FillOptions {
            id: "sub".to_string(),
            subreport: Some(SubreportContext {
                parent_column_count: 1,
                run_to_bottom: true,
            }),
            cancel: None,
        });

    let mut parent: Vec<Page> = Vec::new();
    {
        let mut sink = ParentSink::new(&mut parent);
        let stats = filler
            .fill_report(
                &mut JsonRows::new(numbered_rows(20)),
                &mut RecordCalculator::new(filler.report()),
                &mut NoopScriptlet,
                &mut sink,
            )
            .unwrap();
        assert_eq!(sink.forwarded(), stats.pages);
        assert!(sink.is_complete());
    }
    assert_eq!(parent.len(), 3);
}

// ─── JSON Tests ─────────────────────────────────────────────────

#[test]
fn fill_from_json() {
    let report = r#"{
        "name": "json",
        "page": { "size": { "Custom": { "width": 200, "height": 200 } },
                  "margin": { "top": 10, "right": 10, "bottom": 10, "left": 10 } },
        "detail": { "bands": [ { "height": 20, "elements": [
            { "x": 0, "y": 0, "width": 100, "height": 20,
              "kind": { "type": "Text", "expression": { "type": "Field", "name": "name" }, "lineHeight": 20 } }
        ] } ] }
    }"#;
    let rows = r#"[{ "name": "Ada" }, { "name": "Grace" }]"#;
    let pages = quire::fill_json(report, rows).unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(texts(&pages, &BandKind::Detail), vec!["Ada", "Grace"]);
}

#[test]
fn fill_json_reports_parse_errors() {
    let result = quire::fill_json("{ \"name\": ", "[]");
    assert!(matches!(result, Err(QuireError::ParseError { .. })));
}
