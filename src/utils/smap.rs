// Shallow traversal traits. Each AST type implements these for the node types it directly
// contains; recursive passes are written as shallow maps/folds that call themselves.

pub trait SMapAccum<T> {
    fn smap_accum_l_result<A, E>(
        self,
        acc: Result<A, E>,
        f: impl Fn(A, T) -> Result<(A, T), E>
    ) -> Result<(A, Self), E> where Self: Sized;

    fn smap_accum_l<A>(self, acc: A, f: impl Fn(A, T) -> (A, T)) -> (A, Self)
    where Self: Sized {
        let r: Result<(A, Self), ()> =
            self.smap_accum_l_result(Ok(acc), |acc, t| Ok(f(acc, t)));
        match r {
            Ok(v) => v,
            Err(()) => unreachable!(),
        }
    }

    fn smap_result<E>(self, f: impl Fn(T) -> Result<T, E>) -> Result<Self, E>
    where Self: Sized {
        let (_, res) = self.smap_accum_l_result(Ok(()), |_, t| Ok(((), f(t)?)))?;
        Ok(res)
    }

    fn smap(self, f: impl Fn(T) -> T) -> Self
    where Self: Sized {
        let ((), res) = self.smap_accum_l((), |_, t| ((), f(t)));
        res
    }
}

pub trait SFold<T> {
    fn sfold_result<A, E>(
        &self,
        acc: Result<A, E>,
        f: impl Fn(A, &T) -> Result<A, E>
    ) -> Result<A, E>;

    fn sfold<A>(&self, acc: A, f: impl Fn(A, &T) -> A) -> A {
        let r: Result<A, ()> = self.sfold_result(Ok(acc), |acc, t| Ok(f(acc, t)));
        match r {
            Ok(v) => v,
            Err(()) => unreachable!(),
        }
    }
}

// Flattening map over statement vectors: each statement may be replaced by any number of
// statements, which keeps rewrites that splice prologues or drop dead tails uniform.
pub trait SFlatten<T> {
    fn sflatten_result<E>(
        self,
        acc: Vec<T>,
        f: impl Fn(Vec<T>, T) -> Result<Vec<T>, E>
    ) -> Result<Vec<T>, E>;
}

impl<T> SMapAccum<T> for Vec<T> {
    fn smap_accum_l_result<A, E>(
        self,
        acc: Result<A, E>,
        f: impl Fn(A, T) -> Result<(A, T), E>
    ) -> Result<(A, Vec<T>), E> {
        self.into_iter()
            .fold(acc.map(|a| (a, vec![])), |acc, x| {
                let (acc, mut elems) = acc?;
                let (acc, x) = f(acc, x)?;
                elems.push(x);
                Ok((acc, elems))
            })
    }
}

impl<T> SFold<T> for Vec<T> {
    fn sfold_result<A, E>(
        &self,
        acc: Result<A, E>,
        f: impl Fn(A, &T) -> Result<A, E>
    ) -> Result<A, E> {
        self.iter().fold(acc, |acc, x| f(acc?, x))
    }
}

impl<T: SFlatten<T>> SFlatten<T> for Vec<T> {
    fn sflatten_result<E>(
        self,
        acc: Vec<T>,
        f: impl Fn(Vec<T>, T) -> Result<Vec<T>, E>
    ) -> Result<Vec<T>, E> {
        self.into_iter().fold(Ok(acc), |acc, x| f(acc?, x))
    }
}

impl<K: Ord, T> SMapAccum<T> for std::collections::BTreeMap<K, T> {
    fn smap_accum_l_result<A, E>(
        self,
        acc: Result<A, E>,
        f: impl Fn(A, T) -> Result<(A, T), E>
    ) -> Result<(A, Self), E> {
        self.into_iter()
            .fold(acc.map(|a| (a, Self::new())), |acc, (k, v)| {
                let (acc, mut m) = acc?;
                let (acc, v) = f(acc, v)?;
                m.insert(k, v);
                Ok((acc, m))
            })
    }
}

impl<L, T> SMapAccum<T> for (L, T) {
    fn smap_accum_l_result<A, E>(
        self,
        acc: Result<A, E>,
        f: impl Fn(A, T) -> Result<(A, T), E>
    ) -> Result<(A, Self), E> {
        let (l, t) = self;
        let (acc, t) = f(acc?, t)?;
        Ok((acc, (l, t)))
    }
}

impl<L, T> SFold<T> for (L, T) {
    fn sfold_result<A, E>(
        &self,
        acc: Result<A, E>,
        f: impl Fn(A, &T) -> Result<A, E>
    ) -> Result<A, E> {
        f(acc?, &self.1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn smap_accum_threads_accumulator() {
        let v = vec![1, 2, 3];
        let (count, v) = v.smap_accum_l(0, |acc, x| (acc + 1, x * 10));
        assert_eq!(count, 3);
        assert_eq!(v, vec![10, 20, 30]);
    }

    #[test]
    fn smap_result_short_circuits() {
        let v = vec![1, 2, 3];
        let r: Result<Vec<i64>, String> = v.smap_result(|x| {
            if x == 2 { Err("two".to_string()) } else { Ok(x) }
        });
        assert_eq!(r, Err("two".to_string()));
    }

    #[test]
    fn sfold_accumulates_in_order() {
        let v = vec!["a", "b", "c"];
        let s = v.sfold(String::new(), |acc, x| acc + x);
        assert_eq!(s, "abc");
    }
}
