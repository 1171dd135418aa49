use matrixcompare::assert_scalar_eq;
use mortar::element::CellType;
use mortar::quadrature::{gauss_legendre, integrate, quadrilateral_gauss, rule_for_cell, triangle_rule};

#[test]
fn gauss_legendre_integrates_polynomials_exactly() {
    for n in 1..=5 {
        let (weights, points) = gauss_legendre(n).unwrap();
        assert_eq!(weights.len(), n);
        assert_scalar_eq!(weights.iter().sum::<f64>(), 2.0, comp = abs, tol = 1e-14);
        // ∫ x^p dx over [-1, 1] for the highest degree 2n - 1 and the even degree below it
        for p in [2 * n - 2, 2 * n - 1] {
            let value: f64 = weights.iter().zip(&points).map(|(w, x)| w * x.powi(p as i32)).sum();
            let exact = if p % 2 == 0 { 2.0 / (p as f64 + 1.0) } else { 0.0 };
            assert_scalar_eq!(value, exact, comp = abs, tol = 1e-13);
        }
    }
    assert!(gauss_legendre(0).is_none());
    assert!(gauss_legendre(6).is_none());
}

#[test]
fn quadrilateral_rule_covers_reference_square() {
    for n in 1..=5 {
        let rule = quadrilateral_gauss(n).unwrap();
        assert_eq!(rule.0.len(), n * n);
        assert_scalar_eq!(rule.0.iter().sum::<f64>(), 4.0, comp = abs, tol = 1e-13);
    }
    let rule = quadrilateral_gauss(3).unwrap();
    // ∫∫ x⁴ y² = (2/5) (2/3)
    let value = integrate(&rule, |xi| xi.x.powi(4) * xi.y.powi(2));
    assert_scalar_eq!(value, 4.0 / 15.0, comp = abs, tol = 1e-13);
}

#[test]
fn triangle_rules_are_exact_up_to_their_degree() {
    for degree in 1..=5 {
        let rule = triangle_rule(degree).unwrap();
        assert_scalar_eq!(rule.0.iter().sum::<f64>(), 0.5, comp = abs, tol = 1e-14);
        // ∫ x^a y^b over the reference triangle = a! b! / (a + b + 2)!
        for a in 0..=degree {
            let b = degree - a;
            let factorial = |k: usize| (1..=k).product::<usize>() as f64;
            let exact = factorial(a) * factorial(b) / factorial(a + b + 2);
            let value = integrate(&rule, |xi| xi.x.powi(a as i32) * xi.y.powi(b as i32));
            assert_scalar_eq!(value, exact, comp = abs, tol = 1e-13);
        }
    }
    assert!(triangle_rule(6).is_none());
}

#[test]
fn rule_for_cell_picks_the_reference_domain() {
    let tri = rule_for_cell(CellType::Tri6, 4);
    assert_scalar_eq!(tri.0.iter().sum::<f64>(), 0.5, comp = abs, tol = 1e-14);
    let quad = rule_for_cell(CellType::Quad9, 5);
    assert_scalar_eq!(quad.0.iter().sum::<f64>(), 4.0, comp = abs, tol = 1e-13);
    let nurbs = rule_for_cell(CellType::Nurbs9, 5);
    assert_scalar_eq!(nurbs.0.iter().sum::<f64>(), 4.0, comp = abs, tol = 1e-13);
}
