//! Extraction and detection benchmarks
//!
//! Run with: cargo bench --package tidemark-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tidemark_core::boundaries::{FileDetector, SensitiveFieldDetector, TableResolver};
use tidemark_core::config::ExtractionConfig;
use tidemark_core::extraction::{Extractor, HybridExtractor};

const TYPESCRIPT_SAMPLE: &str = r#"
import { PrismaClient } from '@prisma/client';

const prisma = new PrismaClient();

export class UserRepository {
  async findActive(limit: number) {
    return prisma.user.findMany({ where: { active: true }, take: limit });
  }

  async rename(id: number, name: string) {
    return prisma.user.update({ where: { id }, data: { name } });
  }

  async purge(id: number) {
    await prisma.session.deleteMany({ where: { userId: id } });
    return prisma.user.delete({ where: { id } });
  }

  async report(pool: Pool) {
    return pool.query("SELECT id, email FROM users WHERE created_at > now() - interval '1 day'");
  }
}
"#;

const PYTHON_SAMPLE: &str = r#"
from django.db import models, connection


class Invoice(models.Model):
    number = models.CharField(max_length=32)
    total = models.DecimalField()
    customer_email = models.EmailField()

    class Meta:
        db_table = "billing_invoices"


def open_invoices(customer_id):
    return Invoice.objects.filter(customer_id=customer_id, paid=False)


def totals():
    with connection.cursor() as cursor:
        cursor.execute("SELECT customer_id, SUM(total) FROM billing_invoices GROUP BY customer_id")
        return cursor.fetchall()


def void(invoice_id):
    Invoice.objects.filter(id=invoice_id).delete()
"#;

fn bench_extract_tiers(c: &mut Criterion) {
    let structural = HybridExtractor::new(ExtractionConfig::default());
    let pattern = HybridExtractor::new(ExtractionConfig {
        structural_enabled: Some(false),
        ..Default::default()
    });

    let mut group = c.benchmark_group("extract");
    for (lang, file, source) in [("typescript", "users.ts", TYPESCRIPT_SAMPLE), ("python", "billing.py", PYTHON_SAMPLE)] {
        group.bench_with_input(BenchmarkId::new("structural", lang), &(file, source), |b, (file, source)| {
            b.iter(|| structural.extract(black_box(source), black_box(file)))
        });
        group.bench_with_input(BenchmarkId::new("pattern", lang), &(file, source), |b, (file, source)| {
            b.iter(|| pattern.extract(black_box(source), black_box(file)))
        });
    }
    group.finish();
}

fn bench_detect_file(c: &mut Criterion) {
    let extractor = HybridExtractor::default();
    let resolver = TableResolver::new(None);
    let sensitive = SensitiveFieldDetector::new();
    let detector = FileDetector {
        extractor: &extractor,
        resolver: &resolver,
        sensitive: &sensitive,
    };

    c.bench_function("detect_python_models_and_queries", |b| {
        b.iter(|| detector.detect(black_box(PYTHON_SAMPLE), black_box("billing.py")))
    });
}

criterion_group!(benches, bench_extract_tiers, bench_detect_file);
criterion_main!(benches);
