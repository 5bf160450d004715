//! Environment contractions.
//!
//! MPO environments are stored flat with index order `[ket, mpo, bra]`;
//! overlap environments with `[bra, ket]`.

use crate::mpo::Tensor4;
use crate::mps::{Tensor3, C64};

const ZERO: C64 = C64::new(0.0, 0.0);

/// Extends a left MPO environment by one site.
///
/// `L'[r, w', r'] = Σ L[l, w, l'] A[l, s, r] W[w, s', s, w'] conj(A[l', s', r'])`
pub fn left_step(env: &[C64], a: &Tensor3, w: &Tensor4) -> Vec<C64> {
    let (dl, dp, dr) = (a.dl, a.dp, a.dr);
    let (wl, wr) = (w.dl, w.dr);

    // X[w, l', s, r] = Σ_l L[l, w, l'] A[l, s, r]
    let mut x = vec![ZERO; wl * dl * dp * dr];
    for l in 0..dl {
        for wi in 0..wl {
            for lp in 0..dl {
                let e = env[(l * wl + wi) * dl + lp];
                if e == ZERO {
                    continue;
                }
                for s in 0..dp {
                    for r in 0..dr {
                        x[((wi * dl + lp) * dp + s) * dr + r] += e * a.get(l, s, r);
                    }
                }
            }
        }
    }

    // Y[l', s', w', r] = Σ_{w, s} X[w, l', s, r] W[w, s', s, w']
    let mut y = vec![ZERO; dl * dp * wr * dr];
    for wi in 0..wl {
        for sp in 0..dp {
            for s in 0..dp {
                for wo in 0..wr {
                    let wv = w.get(wi, sp, s, wo);
                    if wv == ZERO {
                        continue;
                    }
                    for lp in 0..dl {
                        for r in 0..dr {
                            y[((lp * dp + sp) * wr + wo) * dr + r] +=
                                wv * x[((wi * dl + lp) * dp + s) * dr + r];
                        }
                    }
                }
            }
        }
    }

    // L'[r, w', r'] = Σ_{l', s'} Y[l', s', w', r] conj(A[l', s', r'])
    let mut out = vec![ZERO; dr * wr * dr];
    for lp in 0..dl {
        for sp in 0..dp {
            for rp in 0..dr {
                let b = a.get(lp, sp, rp).conj();
                if b == ZERO {
                    continue;
                }
                for wo in 0..wr {
                    for r in 0..dr {
                        out[(r * wr + wo) * dr + rp] += y[((lp * dp + sp) * wr + wo) * dr + r] * b;
                    }
                }
            }
        }
    }
    out
}

/// Extends a right MPO environment by one site.
///
/// `R'[l, w, l'] = Σ A[l, s, r] W[w, s', s, w'] conj(A[l', s', r']) R[r, w', r']`
pub fn right_step(env: &[C64], a: &Tensor3, w: &Tensor4) -> Vec<C64> {
    let (dl, dp, dr) = (a.dl, a.dp, a.dr);
    let (wl, wr) = (w.dl, w.dr);

    // X[l', s', r, w'] = Σ_{r'} conj(A[l', s', r']) R[r, w', r']
    let mut x = vec![ZERO; dl * dp * dr * wr];
    for lp in 0..dl {
        for sp in 0..dp {
            for rp in 0..dr {
                let b = a.get(lp, sp, rp).conj();
                if b == ZERO {
                    continue;
                }
                for r in 0..dr {
                    for wo in 0..wr {
                        x[((lp * dp + sp) * dr + r) * wr + wo] += b * env[(r * wr + wo) * dr + rp];
                    }
                }
            }
        }
    }

    // Y[w, s, l', r] = Σ_{s', w'} W[w, s', s, w'] X[l', s', r, w']
    let mut y = vec![ZERO; wl * dp * dl * dr];
    for wi in 0..wl {
        for sp in 0..dp {
            for s in 0..dp {
                for wo in 0..wr {
                    let wv = w.get(wi, sp, s, wo);
                    if wv == ZERO {
                        continue;
                    }
                    for lp in 0..dl {
                        for r in 0..dr {
                            y[((wi * dp + s) * dl + lp) * dr + r] +=
                                wv * x[((lp * dp + sp) * dr + r) * wr + wo];
                        }
                    }
                }
            }
        }
    }

    // R'[l, w, l'] = Σ_{s, r} A[l, s, r] Y[w, s, l', r]
    let mut out = vec![ZERO; dl * wl * dl];
    for l in 0..dl {
        for s in 0..dp {
            for r in 0..dr {
                let av = a.get(l, s, r);
                if av == ZERO {
                    continue;
                }
                for wi in 0..wl {
                    for lp in 0..dl {
                        out[(l * wl + wi) * dl + lp] += av * y[((wi * dp + s) * dl + lp) * dr + r];
                    }
                }
            }
        }
    }
    out
}

/// `E'[ra, rb] = Σ E[la, lb] conj(a[la, s, ra]) b[lb, s, rb]`
pub fn overlap_left_step(env: &[C64], a: &Tensor3, b: &Tensor3) -> Vec<C64> {
    let mut x = vec![ZERO; a.dl * b.dp * b.dr];
    for la in 0..a.dl {
        for lb in 0..b.dl {
            let e = env[la * b.dl + lb];
            if e == ZERO {
                continue;
            }
            for s in 0..b.dp {
                for rb in 0..b.dr {
                    x[(la * b.dp + s) * b.dr + rb] += e * b.get(lb, s, rb);
                }
            }
        }
    }
    let mut out = vec![ZERO; a.dr * b.dr];
    for la in 0..a.dl {
        for s in 0..a.dp {
            for ra in 0..a.dr {
                let av = a.get(la, s, ra).conj();
                if av == ZERO {
                    continue;
                }
                for rb in 0..b.dr {
                    out[ra * b.dr + rb] += av * x[(la * b.dp + s) * b.dr + rb];
                }
            }
        }
    }
    out
}

/// `E'[la, lb] = Σ conj(a[la, s, ra]) b[lb, s, rb] E[ra, rb]`
pub fn overlap_right_step(env: &[C64], a: &Tensor3, b: &Tensor3) -> Vec<C64> {
    let mut x = vec![ZERO; b.dl * b.dp * a.dr];
    for lb in 0..b.dl {
        for s in 0..b.dp {
            for rb in 0..b.dr {
                let bv = b.get(lb, s, rb);
                if bv == ZERO {
                    continue;
                }
                for ra in 0..a.dr {
                    x[(lb * b.dp + s) * a.dr + ra] += bv * env[ra * b.dr + rb];
                }
            }
        }
    }
    let mut out = vec![ZERO; a.dl * b.dl];
    for la in 0..a.dl {
        for s in 0..a.dp {
            for ra in 0..a.dr {
                let av = a.get(la, s, ra).conj();
                if av == ZERO {
                    continue;
                }
                for lb in 0..b.dl {
                    out[la * b.dl + lb] += av * x[(lb * b.dp + s) * a.dr + ra];
                }
            }
        }
    }
    out
}

/// Transfer step of an operator string; `env` is `[ket, bra]`.
///
/// `E'[r, r'] = Σ E[l, l'] A[l, s, r] op[s', s] conj(A[l', s', r'])`
pub fn string_step(env: &[C64], a: &Tensor3, op: Option<&[C64]>) -> Vec<C64> {
    let (dl, dp, dr) = (a.dl, a.dp, a.dr);

    // X[l', s, r] = Σ_l E[l, l'] A[l, s, r]
    let mut x = vec![ZERO; dl * dp * dr];
    for l in 0..dl {
        for lp in 0..dl {
            let e = env[l * dl + lp];
            if e == ZERO {
                continue;
            }
            for s in 0..dp {
                for r in 0..dr {
                    x[(lp * dp + s) * dr + r] += e * a.get(l, s, r);
                }
            }
        }
    }

    if let Some(op) = op {
        let mut y = vec![ZERO; dl * dp * dr];
        for lp in 0..dl {
            for sp in 0..dp {
                for s in 0..dp {
                    let o = op[sp * dp + s];
                    if o == ZERO {
                        continue;
                    }
                    for r in 0..dr {
                        y[(lp * dp + sp) * dr + r] += o * x[(lp * dp + s) * dr + r];
                    }
                }
            }
        }
        x = y;
    }

    let mut out = vec![ZERO; dr * dr];
    for lp in 0..dl {
        for sp in 0..dp {
            for rp in 0..dr {
                let b = a.get(lp, sp, rp).conj();
                if b == ZERO {
                    continue;
                }
                for r in 0..dr {
                    out[r * dr + rp] += x[(lp * dp + sp) * dr + r] * b;
                }
            }
        }
    }
    out
}
