use criterion::{black_box, criterion_group, criterion_main, Criterion};

use benchgrade_core::engine::{BenchmarkEngine, EngineConfig};
use benchgrade_core::memory::MemoryStore;
use benchgrade_core::model::{
    Category, Course, Department, Gradebook, Item, Mark, MarkingPeriod, SchoolYear, Student,
};
use benchgrade_core::rules::{CalculationRule, CategoryAsCourse, PerCourseCategory};
use chrono::NaiveDate;
use rust_decimal::Decimal;

const STUDENTS: u32 = 30;
const COURSES: u32 = 6;
const ITEMS_PER_CATEGORY: u32 = 8;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_gradebook() -> Gradebook {
    let mut book = Gradebook::new("bench");
    book.insert_school_year(SchoolYear {
        id: 1,
        name: "2013-2014".into(),
        start_date: date(2013, 8, 26),
        end_date: date(2014, 6, 13),
        benchmark_grade: true,
    });
    for (id, (start, end)) in [
        (date(2013, 8, 26), date(2013, 10, 31)),
        (date(2013, 11, 1), date(2014, 1, 24)),
    ]
    .into_iter()
    .enumerate()
    {
        book.insert_marking_period(MarkingPeriod {
            id: id as u32 + 1,
            name: format!("Q{}", id + 1),
            school_year: 1,
            start_date: start,
            end_date: end,
            show_reports: true,
        });
    }
    for id in 1..=2 {
        book.insert_department(Department {
            id,
            name: format!("Department {id}"),
        });
    }
    for (id, name, multiple) in [(1, "Standards", true), (2, "Engagement", false)] {
        book.insert_category(Category {
            id,
            name: name.into(),
            allow_multiple_demonstrations: multiple,
            display_scale: None,
            display_symbol: String::new(),
        });
    }
    let students: Vec<u32> = (1..=STUDENTS).collect();
    for &id in &students {
        book.insert_student(Student {
            id,
            name: format!("Student {id}"),
        });
    }

    let mut item_id = 0;
    let mut mark_id = 0;
    for course in 1..=COURSES {
        book.insert_course(Course {
            id: course,
            name: format!("Course {course}"),
            department: Some(course % 2 + 1),
            credits: Some(Decimal::ONE),
            marking_periods: vec![1, 2],
            graded: true,
            students: students.clone(),
        });
        for category in 1..=2 {
            for period in 1..=2 {
                for _ in 0..ITEMS_PER_CATEGORY {
                    item_id += 1;
                    book.insert_item(Item {
                        id: item_id,
                        name: format!("Item {item_id}"),
                        course,
                        category,
                        marking_period: Some(period),
                        points_possible: Some(Decimal::from(4)),
                    });
                    for &student in &students {
                        mark_id += 1;
                        book.insert_mark(Mark {
                            id: mark_id,
                            item: item_id,
                            student,
                            mark: Some(Decimal::from((student + item_id) % 5)),
                            description: String::new(),
                        });
                    }
                }
            }
        }
    }

    book.push_rule(CalculationRule {
        id: 1,
        first_year_effective: 1,
        points_possible: Decimal::from(4),
        decimal_places: 2,
        per_course_categories: vec![
            PerCourseCategory {
                category: 1,
                weight: Decimal::new(7, 1),
                apply_to_departments: vec![1, 2],
            },
            PerCourseCategory {
                category: 2,
                weight: Decimal::new(3, 1),
                apply_to_departments: vec![1, 2],
            },
        ],
        categories_as_courses: vec![CategoryAsCourse {
            category: 2,
            include_departments: vec![1, 2],
        }],
        substitutions: vec![],
    });
    book
}

fn bench_aggregators(c: &mut Criterion) {
    let book = make_gradebook();
    let mut group = c.benchmark_group("aggregators");

    group.bench_function("course_category", |b| {
        let mut engine = BenchmarkEngine::new(&book, MemoryStore::new(), EngineConfig::default());
        b.iter(|| {
            engine
                .calculate_course_category_aggregate(black_box(1), 1, 1, Some(1), None)
                .unwrap()
        })
    });

    group.bench_function("course_recalculate_all_categories", |b| {
        let mut engine = BenchmarkEngine::new(&book, MemoryStore::new(), EngineConfig::default());
        b.iter(|| {
            engine
                .calculate_course_aggregate(black_box(1), 1, Some(1), None, true)
                .unwrap()
        })
    });

    group.bench_function("category_as_course", |b| {
        let mut engine = BenchmarkEngine::new(&book, MemoryStore::new(), EngineConfig::default());
        b.iter(|| {
            engine
                .calculate_category_as_course_aggregate(black_box(1), 2, 1)
                .unwrap()
        })
    });

    group.finish();
}

fn bench_recalculation(c: &mut Criterion) {
    let book = make_gradebook();
    let mut group = c.benchmark_group("recalculation");
    group.sample_size(20);

    group.bench_function("item_change_all_students", |b| {
        let mut engine = BenchmarkEngine::new(&book, MemoryStore::new(), EngineConfig::default());
        b.iter(|| engine.recalculate_on_item_change(black_box(1), None).unwrap())
    });

    group.bench_function("student_gpa", |b| {
        let mut engine = BenchmarkEngine::new(&book, MemoryStore::new(), EngineConfig::default());
        engine.recalculate_all().unwrap();
        b.iter(|| engine.student_gpa(black_box(1), None, None).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_aggregators, bench_recalculation);
criterion_main!(benches);
