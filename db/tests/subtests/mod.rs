// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use streamstore_db::{BlockMap, Error};

pub fn append<M>(db: &M)
where
    M: BlockMap,
{
    let value = [1];
    db.append(&value).unwrap();
}

pub fn get<M>(db: &M)
where
    M: BlockMap,
{
    let value = [1, 2, 3];
    let key = db.append(&value).unwrap();
    let res = db.get(key).unwrap();
    assert_eq!(value.as_ref(), res.as_slice());
}

pub fn get_missing<M>(db: &M)
where
    M: BlockMap,
{
    let res = db.get(42);
    assert_eq!(res, Err(Error::BlockNotFound(42)));
}

pub fn keys_strictly_increase<M>(db: &M)
where
    M: BlockMap,
{
    let k0 = db.append(&[0]).unwrap();
    let k1 = db.append(&[1]).unwrap();
    let k2 = db.append(&[2]).unwrap();
    assert!(k0 < k1 && k1 < k2);

    // Removal must not make a key eligible for reuse.
    db.remove(k2).unwrap();
    let k3 = db.append(&[3]).unwrap();
    assert!(k3 > k2);
}

pub fn remove<M>(db: &M)
where
    M: BlockMap,
{
    let key = db.append(&[1]).unwrap();
    db.remove(key).unwrap();
    assert_eq!(db.get(key), Err(Error::BlockNotFound(key)));
}

pub fn remove_missing<M>(db: &M)
where
    M: BlockMap,
{
    db.remove(7).unwrap();
}

pub fn last_key<M>(db: &M)
where
    M: BlockMap,
{
    assert_eq!(db.last_key().unwrap(), None);
    let key = db.append(&[1]).unwrap();
    assert_eq!(db.last_key().unwrap(), Some(key));

    // `last_key` reports allocation, not liveness.
    db.remove(key).unwrap();
    assert_eq!(db.last_key().unwrap(), Some(key));
}

pub fn is_empty<M>(db: &M)
where
    M: BlockMap,
{
    assert!(db.is_empty().unwrap());
    let key = db.append(&[1]).unwrap();
    assert!(!db.is_empty().unwrap());
    db.remove(key).unwrap();
    assert!(db.is_empty().unwrap());
}

pub fn clear<M>(db: &M)
where
    M: BlockMap,
{
    let key = db.append(&[1]).unwrap();
    db.append(&[2]).unwrap();
    db.clear().unwrap();
    assert!(db.is_empty().unwrap());

    // Allocation continues past cleared keys.
    let next = db.append(&[3]).unwrap();
    assert!(next > key);
}

pub fn lifecycle<M>(db: &M)
where
    M: BlockMap,
{
    db.save().unwrap();
    db.gc().unwrap();
    db.close().unwrap();
}
