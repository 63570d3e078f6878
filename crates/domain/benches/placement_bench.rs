use common::{Money, PaymentMethod, Principal, Product, ShippingAddress, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CancelOrder, CartService, CatalogService, OrderLifecycleManager, PlaceOrder};
use store::InMemoryStore;

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Bench Customer".into(),
        phone: "555-0000".into(),
        address: "1 Bench St".into(),
        city: "Benchville".into(),
        postal_code: "00000".into(),
        country: "US".into(),
    }
}

struct Fixture {
    carts: CartService<InMemoryStore>,
    orders: OrderLifecycleManager<InMemoryStore>,
    products: Vec<Product>,
}

fn fixture(rt: &tokio::runtime::Runtime, product_count: usize) -> Fixture {
    let store = InMemoryStore::new();
    let catalog = CatalogService::new(store.clone());
    let products = rt.block_on(async {
        let mut products = Vec::with_capacity(product_count);
        for i in 0..product_count {
            let product = Product::new(format!("Product {i}"), Money::from_cents(999), u32::MAX / 2);
            products.push(catalog.upsert_product(product).await.unwrap());
        }
        products
    });
    Fixture {
        carts: CartService::new(store.clone()),
        orders: OrderLifecycleManager::new(store),
        products,
    }
}

fn bench_place_single_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fx = fixture(&rt, 1);
    let customer = Principal::customer(UserId::new());

    c.bench_function("placement/single_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                fx.carts.add(&customer, fx.products[0].id, 1).await.unwrap();
                fx.orders
                    .place_order(&customer, PlaceOrder::new(address(), PaymentMethod::Online))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_place_ten_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fx = fixture(&rt, 10);
    let customer = Principal::customer(UserId::new());

    c.bench_function("placement/ten_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                for product in &fx.products {
                    fx.carts.add(&customer, product.id, 2).await.unwrap();
                }
                fx.orders
                    .place_order(&customer, PlaceOrder::new(address(), PaymentMethod::Online))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_place_and_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fx = fixture(&rt, 3);
    let customer = Principal::customer(UserId::new());

    c.bench_function("placement/place_then_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                for product in &fx.products {
                    fx.carts.add(&customer, product.id, 1).await.unwrap();
                }
                let order = fx
                    .orders
                    .place_order(&customer, PlaceOrder::new(address(), PaymentMethod::Online))
                    .await
                    .unwrap()
                    .into_order();
                fx.orders
                    .cancel(&customer, CancelOrder::new(order.id))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_place_single_line,
    bench_place_ten_lines,
    bench_place_and_cancel,
);
criterion_main!(benches);
